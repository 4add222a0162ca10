//! Detects one-sided deletions and finishes them on the other side.

use tracing::{debug, info};

use crate::clients::{LocalStore, RemoteBoard};
use crate::error::SyncError;
use crate::model::project::ProjectSyncConfig;
use crate::store::Store;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub remote_deleted: usize,
    pub local_deleted: usize,
    pub bookmarks_removed: usize,
}

/// Walks every bookmark of `project`, checking existence only.
pub async fn purge_project(
    store: &Store,
    project: &ProjectSyncConfig,
    remote: &dyn RemoteBoard,
    local: &dyn LocalStore,
    dry_run: bool,
) -> Result<PurgeReport, SyncError> {
    let collection = project.collection();
    let mut report = PurgeReport::default();

    for pair in store.pairs(&collection)? {
        let local_gone = match &pair.local_id {
            None => true,
            Some(uuid) => match local.get_task(uuid).await {
                Ok(task) => task.deleted,
                Err(err) if err.is_not_found() => true,
                Err(err) => return Err(err.into()),
            },
        };
        let remote_gone = match pair.remote_id {
            None => true,
            Some(id) => match remote.get_task(id).await {
                Ok(_) => false,
                Err(err) if err.is_not_found() => true,
                Err(err) => return Err(err.into()),
            },
        };

        if !local_gone && !remote_gone {
            continue;
        }
        debug!(local = ?pair.local_id, remote = ?pair.remote_id, local_gone, remote_gone, "orphaned pair");

        if local_gone && !remote_gone {
            if let Some(id) = pair.remote_id {
                if dry_run {
                    info!(id, "[dry-run] would remove board task");
                } else {
                    info!(id, "Removing board task deleted locally");
                    remote.remove_task(id).await?;
                }
                report.remote_deleted += 1;
            }
        }
        if remote_gone && !local_gone {
            if let Some(uuid) = &pair.local_id {
                if dry_run {
                    info!(%uuid, "[dry-run] would delete local task");
                } else {
                    info!(%uuid, "Deleting local task removed from board");
                    local.delete(uuid).await?;
                }
                report.local_deleted += 1;
            }
        }

        if !dry_run {
            store.remove_pair(&collection, &pair)?;
        }
        report.bookmarks_removed += 1;
    }

    info!(
        project = %project.name,
        remote_deleted = report.remote_deleted,
        local_deleted = report.local_deleted,
        bookmarks_removed = report.bookmarks_removed,
        "Purge finished"
    );
    Ok(report)
}
