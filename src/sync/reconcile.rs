//! Decides, per candidate, which direction(s) to propagate and applies them.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::changeset::{Candidate, ChangeSet};
use super::to_local::{plan_local, LocalPlan};
use super::to_remote::{plan_remote, RemotePlan};
use super::TranslateContext;
use crate::clients::{LocalStore, RemoteBoard};
use crate::error::{ClientError, SyncError};
use crate::model::board::{RemoteTask, CONFLICT_MARKER};
use crate::model::local::LocalTask;
use crate::model::mutation::{
    Lifecycle, LocalTransition, RemoteCreate, RemoteMove, RemoteUpdate,
};
use crate::model::project::ProjectSyncConfig;
use crate::model::sync_pair::SyncPair;

/// Position given to moved tasks: top of the column.
const MOVE_POSITION: i64 = 1;

pub struct Reconciler<'a> {
    remote: &'a dyn RemoteBoard,
    local: &'a dyn LocalStore,
    project: &'a ProjectSyncConfig,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        remote: &'a dyn RemoteBoard,
        local: &'a dyn LocalStore,
        project: &'a ProjectSyncConfig,
        dry_run: bool,
    ) -> Self {
        Self {
            remote,
            local,
            project,
            dry_run,
        }
    }

    /// Reconciles one candidate and returns the bookmark to record.
    ///
    /// Any rejected create/update aborts with an error; nothing is reported
    /// as synced unless every applicable direction went through.
    pub async fn reconcile(
        &self,
        candidate: &Candidate,
        changes: &ChangeSet,
        ctx: &TranslateContext,
    ) -> Result<SyncPair, SyncError> {
        let mut local_task = match &candidate.local_id {
            Some(uuid) => self.lookup_local(uuid, changes).await?,
            None => None,
        };
        let mut remote_task = match candidate.remote_id {
            Some(id) => self.lookup_remote(id, changes).await?,
            None => None,
        };

        let conflict = candidate.is_conflict();
        if conflict {
            debug!(
                local = ?candidate.local_id,
                remote = ?candidate.remote_id,
                "both sides changed since last sync, resolving conflict"
            );
        }

        let mut seen = candidate.local_modified.max(candidate.remote_modified);

        if candidate.local_changed() {
            match &local_task {
                Some(task) if task.deleted => {
                    debug!(uuid = %task.uuid, "local task is deleted, leaving board untouched");
                }
                Some(task) => {
                    let plan = plan_remote(task, self.project, ctx)?;
                    remote_task = self.push(task, plan, remote_task, conflict).await?;
                }
                None => {}
            }
        }

        if candidate.remote_changed() {
            let tombstoned = local_task.as_ref().is_some_and(|t| t.deleted);
            if tombstoned {
                debug!(remote = ?candidate.remote_id, "local task is deleted, leaving it to purge");
            } else if let Some(task) = &remote_task {
                let plan = plan_local(task, local_task.as_ref(), self.project, ctx)?;
                local_task = self.pull(task, plan, local_task).await?;
            }
        }

        if let Some(task) = &remote_task {
            seen = seen.max(task.modified);
        }
        if let Some(task) = &local_task {
            seen = seen.max(task.modified);
        }

        Ok(SyncPair {
            local_id: local_task
                .map(|t| t.uuid)
                .or_else(|| candidate.local_id.clone()),
            remote_id: remote_task.map(|t| t.id).or(candidate.remote_id),
            last_sync: bookmark_time(Utc::now(), seen),
        })
    }

    async fn lookup_local(
        &self,
        uuid: &str,
        changes: &ChangeSet,
    ) -> Result<Option<LocalTask>, SyncError> {
        if let Some(task) = changes.local_task(uuid) {
            return Ok(Some(task.clone()));
        }
        match self.local.get_task(uuid).await {
            Ok(task) => Ok(Some(task)),
            Err(err) if err.is_not_found() => {
                debug!(%uuid, "paired local task no longer exists");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn lookup_remote(
        &self,
        id: i64,
        changes: &ChangeSet,
    ) -> Result<Option<RemoteTask>, SyncError> {
        if let Some(task) = changes.remote_task(id) {
            return Ok(Some(task.clone()));
        }
        match self.remote.get_task(id).await {
            Ok(task) => Ok(Some(task)),
            Err(err) if err.is_not_found() => {
                debug!(id, "paired board task no longer exists");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Writes a local task to the board; returns the board task as it now is.
    async fn push(
        &self,
        source: &LocalTask,
        plan: RemotePlan,
        existing: Option<RemoteTask>,
        conflict: bool,
    ) -> Result<Option<RemoteTask>, SyncError> {
        let project_id = self.project.project_id;

        if self.dry_run {
            match &existing {
                None => info!(uuid = %source.uuid, title = %plan.fields.title, "[dry-run] would create board task"),
                Some(task) => {
                    if conflict {
                        info!(id = task.id, "[dry-run] would duplicate board task as conflict copy");
                    }
                    info!(id = task.id, uuid = %source.uuid, "[dry-run] would update board task");
                    if plan.column_id.is_some() || plan.swimlane_id.is_some() {
                        info!(id = task.id, column = ?plan.column_id, swimlane = ?plan.swimlane_id, "[dry-run] would move board task");
                    }
                }
            }
            if let Some(lifecycle) = plan.lifecycle {
                info!(?lifecycle, "[dry-run] would change board task status");
            }
            return Ok(existing);
        }

        let id = match &existing {
            None => {
                info!(uuid = %source.uuid, title = %plan.fields.title, "Creating board task");
                let request =
                    RemoteCreate::new(project_id, plan.fields.clone(), plan.column_id, plan.swimlane_id)?;
                self.remote.create_task(&request).await?
            }
            Some(task) => {
                if conflict {
                    let copy = self
                        .remote
                        .duplicate_task_to_project(task.id, project_id)
                        .await?;
                    self.remote
                        .update_task(&RemoteUpdate::title_only(
                            copy,
                            format!("{CONFLICT_MARKER}{}", task.title),
                        ))
                        .await?;
                    warn!(id = task.id, copy, "Conflict: kept previous board state as a copy");
                }

                info!(id = task.id, uuid = %source.uuid, "Updating board task");
                self.remote
                    .update_task(&RemoteUpdate::from_fields(task.id, &plan.fields)?)
                    .await?;

                if plan.column_id.is_some() || plan.swimlane_id.is_some() {
                    let request = RemoteMove {
                        task_id: task.id,
                        project_id,
                        column_id: plan.column_id.unwrap_or(task.column_id),
                        swimlane_id: plan.swimlane_id.unwrap_or(task.swimlane_id),
                        position: MOVE_POSITION,
                    };
                    best_effort(self.remote.move_task(&request).await, "move", task.id)?;
                }
                task.id
            }
        };

        match plan.lifecycle {
            Some(Lifecycle::Open) => best_effort(self.remote.open_task(id).await, "open", id)?,
            Some(Lifecycle::Close) => best_effort(self.remote.close_task(id).await, "close", id)?,
            None => {}
        }

        Ok(Some(self.remote.get_task(id).await?))
    }

    /// Writes a board task to the local store; returns the local task as it now is.
    async fn pull(
        &self,
        source: &RemoteTask,
        plan: LocalPlan,
        existing: Option<LocalTask>,
    ) -> Result<Option<LocalTask>, SyncError> {
        if self.dry_run {
            match &existing {
                None => info!(id = source.id, title = %source.title, "[dry-run] would create local task"),
                Some(task) => info!(id = source.id, uuid = %task.uuid, "[dry-run] would update local task"),
            }
            for transition in plan.before.iter().chain(&plan.after) {
                info!(?transition, "[dry-run] would change local task state");
            }
            return Ok(existing);
        }

        let uuid = match &existing {
            Some(task) => {
                for transition in &plan.before {
                    self.transition(&task.uuid, *transition).await?;
                }
                info!(id = source.id, uuid = %task.uuid, "Updating local task");
                self.local.save(&task.uuid, &plan.update).await?;
                task.uuid.clone()
            }
            None => {
                info!(id = source.id, title = %source.title, "Creating local task");
                self.local.create_task(&plan.update).await?.uuid
            }
        };
        for transition in &plan.after {
            self.transition(&uuid, *transition).await?;
        }

        Ok(Some(self.local.get_task(&uuid).await?))
    }

    async fn transition(&self, uuid: &str, transition: LocalTransition) -> Result<(), SyncError> {
        debug!(%uuid, ?transition, "local state change");
        match transition {
            LocalTransition::Start => self.local.start(uuid).await?,
            LocalTransition::Stop => self.local.stop(uuid).await?,
            LocalTransition::Complete => self.local.complete(uuid).await?,
        }
        Ok(())
    }
}

/// Position and status changes may legitimately be refused (e.g. nothing
/// to change); only connectivity and credential failures propagate.
fn best_effort(result: Result<(), ClientError>, what: &str, id: i64) -> Result<(), SyncError> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_auth() || err.is_unreachable() => Err(err.into()),
        Err(err) => {
            warn!(id, error = %err, "Did not succeed to {what} board task, no change?");
            Ok(())
        }
    }
}

/// Never earlier than anything observed for the pair.
fn bookmark_time(now: DateTime<Utc>, seen: DateTime<Utc>) -> DateTime<Utc> {
    now.max(seen)
}
