//! Typed mutation requests exchanged between the translators and the clients.

use chrono::{DateTime, Utc};

use crate::error::SyncError;

/// Fields shared by board creation and update requests.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteFields {
    pub title: String,
    /// Already formatted for the board (`%Y-%m-%d %H:%M`).
    pub due: Option<String>,
    pub owner_id: Option<i64>,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCreate {
    pub project_id: i64,
    pub fields: RemoteFields,
    pub column_id: Option<i64>,
    pub swimlane_id: Option<i64>,
}

impl RemoteCreate {
    pub fn new(
        project_id: i64,
        fields: RemoteFields,
        column_id: Option<i64>,
        swimlane_id: Option<i64>,
    ) -> Result<Self, SyncError> {
        if fields.title.trim().is_empty() {
            return Err(SyncError::InvalidMutation(
                "a board task needs a non-empty title".into(),
            ));
        }
        Ok(Self {
            project_id,
            fields,
            column_id,
            swimlane_id,
        })
    }
}

/// Generic field update; position changes go through [`RemoteMove`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteUpdate {
    pub task_id: i64,
    pub title: Option<String>,
    pub due: Option<String>,
    pub category_id: Option<i64>,
}

impl RemoteUpdate {
    pub fn from_fields(task_id: i64, fields: &RemoteFields) -> Result<Self, SyncError> {
        if fields.title.trim().is_empty() {
            return Err(SyncError::InvalidMutation(format!(
                "refusing to blank the title of board task {task_id}"
            )));
        }
        Ok(Self {
            task_id,
            title: Some(fields.title.clone()),
            due: fields.due.clone(),
            category_id: fields.category_id,
        })
    }

    pub fn title_only(task_id: i64, title: String) -> Self {
        Self {
            task_id,
            title: Some(title),
            due: None,
            category_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMove {
    pub task_id: i64,
    pub project_id: i64,
    pub column_id: i64,
    pub swimlane_id: i64,
    pub position: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Open,
    Close,
}

/// How the local wait date should change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitChange {
    #[default]
    Keep,
    Clear,
    Until(DateTime<Utc>),
}

/// Attribute changes written to a local task in one save.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalUpdate {
    pub description: String,
    pub project: String,
    /// `None` leaves the due date untouched.
    pub due: Option<DateTime<Utc>>,
    pub wait: WaitChange,
    pub swimlane: Option<String>,
    /// `None` leaves the category untouched.
    pub category: Option<String>,
}

/// State transition of a local task; each one is persisted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalTransition {
    Start,
    Stop,
    Complete,
}
