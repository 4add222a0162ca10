use chrono::{DateTime, Utc};

/// Title prefix of the copies left behind when both sides changed.
pub const CONFLICT_MARKER: &str = "CONFLICT";

/// A task on the remote board.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTask {
    pub id: i64,
    pub title: String,
    pub project_id: i64,
    /// Unix seconds; 0 means no due date.
    pub date_due: i64,
    pub column_id: i64,
    pub swimlane_id: i64,
    pub category_id: Option<i64>,
    pub owner_id: Option<i64>,
    pub is_open: bool,
    pub modified: DateTime<Utc>,
}

impl RemoteTask {
    pub fn is_conflict_copy(&self) -> bool {
        self.title.starts_with(CONFLICT_MARKER)
    }

    pub fn due(&self) -> Option<DateTime<Utc>> {
        if self.date_due == 0 {
            return None;
        }
        DateTime::from_timestamp(self.date_due, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProject {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser {
    pub id: i64,
    pub username: String,
}

/// A column, swimlane or category of a board project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardEntry {
    pub id: i64,
    pub name: String,
}

/// Search predicate for changed board tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskQuery {
    pub modified_since: DateTime<Utc>,
    pub assignee: Option<String>,
}

impl TaskQuery {
    /// Renders the query in the board's search language.
    pub fn to_query_string(&self) -> String {
        let mut query = format!("modified:>={}", self.modified_since.timestamp());
        if let Some(assignee) = &self.assignee {
            query.push_str(&format!(" assignee:\"{assignee}\""));
        }
        query
    }
}
