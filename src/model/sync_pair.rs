use chrono::{DateTime, Utc};

/// Bookmark joining a local and a remote task believed to be the same.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPair {
    pub local_id: Option<String>,
    pub remote_id: Option<i64>,
    pub last_sync: DateTime<Utc>,
}

impl SyncPair {
    /// True when either identity matches.
    pub fn matches(&self, local_id: Option<&str>, remote_id: Option<i64>) -> bool {
        let local_match = local_id.is_some() && self.local_id.as_deref() == local_id;
        let remote_match = remote_id.is_some() && self.remote_id == remote_id;
        local_match || remote_match
    }
}
