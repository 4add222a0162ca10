//! Joins the changed tasks of both sides against the bookmarks.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::model::board::RemoteTask;
use crate::model::local::LocalTask;
use crate::model::sync_pair::SyncPair;
use crate::util::dates::sync_epoch;

/// A task pair that needs reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub local_id: Option<String>,
    pub remote_id: Option<i64>,
    pub local_modified: DateTime<Utc>,
    pub remote_modified: DateTime<Utc>,
    pub last_sync: DateTime<Utc>,
}

impl Candidate {
    pub fn local_changed(&self) -> bool {
        self.local_modified > self.last_sync
    }

    pub fn remote_changed(&self) -> bool {
        self.remote_modified > self.last_sync
    }

    /// Both sides moved on since the last reconciliation.
    pub fn is_conflict(&self) -> bool {
        self.local_changed() && self.remote_changed()
    }
}

/// One changed task from either side, before grouping.
struct ChangeRow {
    local_id: Option<String>,
    remote_id: Option<i64>,
    local_modified: Option<DateTime<Utc>>,
    remote_modified: Option<DateTime<Utc>>,
}

/// Candidates plus the task snapshots they were built from.
#[derive(Debug, Default)]
pub struct ChangeSet {
    candidates: Vec<Candidate>,
    local: HashMap<String, LocalTask>,
    remote: HashMap<i64, RemoteTask>,
}

impl ChangeSet {
    /// Recurring local tasks and board conflict copies never take part.
    pub fn build(
        local_changes: Vec<LocalTask>,
        remote_changes: Vec<RemoteTask>,
        pairs: &[SyncPair],
    ) -> Self {
        let local: HashMap<String, LocalTask> = local_changes
            .into_iter()
            .filter(|t| {
                if t.recurring {
                    debug!(uuid = %t.uuid, "skipping recurring task");
                }
                !t.recurring
            })
            .map(|t| (t.uuid.clone(), t))
            .collect();
        let remote: HashMap<i64, RemoteTask> = remote_changes
            .into_iter()
            .filter(|t| !t.is_conflict_copy())
            .map(|t| (t.id, t))
            .collect();

        let rows = local
            .values()
            .map(|t| ChangeRow {
                local_id: Some(t.uuid.clone()),
                remote_id: None,
                local_modified: Some(t.modified),
                remote_modified: None,
            })
            .chain(remote.values().map(|t| ChangeRow {
                local_id: None,
                remote_id: Some(t.id),
                local_modified: None,
                remote_modified: Some(t.modified),
            }));

        let epoch = sync_epoch();
        let mut groups: BTreeMap<(Option<String>, Option<i64>), Candidate> = BTreeMap::new();
        for row in rows {
            let pair = pairs
                .iter()
                .find(|p| p.matches(row.local_id.as_deref(), row.remote_id));
            let local_id = pair
                .and_then(|p| p.local_id.clone())
                .or(row.local_id);
            let remote_id = pair.and_then(|p| p.remote_id).or(row.remote_id);
            let last_sync = pair.map_or(epoch, |p| p.last_sync);
            let local_modified = row.local_modified.unwrap_or(epoch);
            let remote_modified = row.remote_modified.unwrap_or(epoch);

            groups
                .entry((local_id.clone(), remote_id))
                .and_modify(|c| {
                    c.local_modified = c.local_modified.max(local_modified);
                    c.remote_modified = c.remote_modified.max(remote_modified);
                })
                .or_insert(Candidate {
                    local_id,
                    remote_id,
                    local_modified,
                    remote_modified,
                    last_sync,
                });
        }

        let candidates = groups
            .into_values()
            .filter(|c| c.local_changed() || c.remote_changed())
            .collect();

        Self {
            candidates,
            local,
            remote,
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn local_task(&self, uuid: &str) -> Option<&LocalTask> {
        self.local.get(uuid)
    }

    pub fn remote_task(&self, id: i64) -> Option<&RemoteTask> {
        self.remote.get(&id)
    }
}
