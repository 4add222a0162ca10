use rusqlite::params;

use super::Store;
use crate::error::SyncError;
use crate::model::sync_pair::SyncPair;

impl Store {
    pub fn pairs(&self, collection: &str) -> Result<Vec<SyncPair>, SyncError> {
        let mut stmt = self.conn().prepare(
            "SELECT local_id, remote_id, last_sync FROM sync_pairs WHERE collection = ?1 ORDER BY rowid",
        )?;
        let pairs = stmt
            .query_map(params![collection], |row| {
                Ok(SyncPair {
                    local_id: row.get(0)?,
                    remote_id: row.get(1)?,
                    last_sync: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs)
    }

    /// Records a pair, replacing any row that shares either identity.
    pub fn upsert_pair(&self, collection: &str, pair: &SyncPair) -> Result<(), SyncError> {
        if pair.local_id.is_none() && pair.remote_id.is_none() {
            return Err(SyncError::InvalidMutation(
                "a sync pair needs at least one task id".into(),
            ));
        }
        self.conn().execute(
            "INSERT OR REPLACE INTO sync_pairs (collection, local_id, remote_id, last_sync) \
             VALUES (?1, ?2, ?3, ?4)",
            params![collection, pair.local_id, pair.remote_id, pair.last_sync],
        )?;
        Ok(())
    }

    pub fn remove_pair(&self, collection: &str, pair: &SyncPair) -> Result<(), SyncError> {
        self.conn().execute(
            "DELETE FROM sync_pairs WHERE collection = ?1 \
             AND local_id IS ?2 AND remote_id IS ?3",
            params![collection, pair.local_id, pair.remote_id],
        )?;
        Ok(())
    }
}
