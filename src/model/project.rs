use chrono::{DateTime, Utc};

use super::mapping::MappingTable;
use crate::util::dates::sync_epoch;

/// Restricts synchronization to the tasks of one board user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignee {
    pub id: i64,
    pub name: String,
}

/// Everything needed to keep one board project in step with the local store.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSyncConfig {
    /// Board project name, also used as the local project name.
    pub name: String,
    pub url: String,
    pub user: String,
    pub apitoken: String,
    pub project_id: i64,
    pub assignee: Option<Assignee>,
    /// Run the local store's own ledger sync before reconciling.
    pub run_ledger_sync: bool,
    pub last_sync: DateTime<Utc>,
    pub mapping: MappingTable,
}

impl ProjectSyncConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>, project_id: i64) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            user: String::new(),
            apitoken: String::new(),
            project_id,
            assignee: None,
            run_ledger_sync: false,
            last_sync: sync_epoch(),
            mapping: MappingTable::default(),
        }
    }

    /// Name of the sync pair collection owned by this project.
    pub fn collection(&self) -> String {
        format!("{}_tasks", self.name.to_lowercase())
    }
}
