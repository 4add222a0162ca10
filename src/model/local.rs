use chrono::{DateTime, Utc};

/// A task as held by the local personal task store.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalTask {
    pub uuid: String,
    pub description: String,
    pub project: Option<String>,
    pub due: Option<DateTime<Utc>>,
    pub active: bool,
    pub completed: bool,
    /// Soft-delete flag; the local store keeps tombstones.
    pub deleted: bool,
    pub wait: Option<DateTime<Utc>>,
    /// Recurring templates and their generated instances are never synchronized.
    pub recurring: bool,
    pub swimlane: Option<String>,
    pub category: Option<String>,
    pub modified: DateTime<Utc>,
}

impl LocalTask {
    pub fn is_waiting(&self, now: DateTime<Utc>) -> bool {
        self.wait.is_some_and(|until| until > now)
    }
}

/// Selection used to pull changed local tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFilter {
    pub project: String,
    pub modified_after: DateTime<Utc>,
}
