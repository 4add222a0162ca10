//! Board task → local mutation.

use chrono::Duration;

use super::TranslateContext;
use crate::error::SyncError;
use crate::model::board::RemoteTask;
use crate::model::local::LocalTask;
use crate::model::mapping::VirtualTag;
use crate::model::mutation::{LocalTransition, LocalUpdate, WaitChange};
use crate::model::project::ProjectSyncConfig;

/// How far a task parked in the waiting column is hidden locally.
const WAIT_HORIZON_DAYS: i64 = 366;

/// Ordered local changes for one board task.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlan {
    /// Transitions that must happen before the attribute save.
    pub before: Vec<LocalTransition>,
    pub update: LocalUpdate,
    /// Transitions applied after the save.
    pub after: Vec<LocalTransition>,
}

pub fn plan_local(
    task: &RemoteTask,
    existing: Option<&LocalTask>,
    project: &ProjectSyncConfig,
    ctx: &TranslateContext,
) -> Result<LocalPlan, SyncError> {
    let mapping = &project.mapping;

    let swimlane = mapping
        .swimlanes
        .alias_for(task.swimlane_id)
        .cloned()
        .ok_or_else(|| SyncError::SwimlaneUnmapped(format!("board swimlane {}", task.swimlane_id)))?;

    let category = task
        .category_id
        .and_then(|id| mapping.categories.alias_for(id))
        .cloned();

    let active = existing.is_some_and(|t| t.active);
    let completed = existing.is_some_and(|t| t.completed);
    let deleted = existing.is_some_and(|t| t.deleted);
    let waiting = existing.is_some_and(|t| t.is_waiting(ctx.now));

    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut wait = WaitChange::Keep;

    match mapping.tag_for_column(task.column_id) {
        Some(VirtualTag::Waiting) => {
            if active {
                before.push(LocalTransition::Stop);
            }
            wait = WaitChange::Until(ctx.now + Duration::days(WAIT_HORIZON_DAYS));
        }
        Some(VirtualTag::Active) => {
            if waiting {
                wait = WaitChange::Clear;
            }
            if !active && !completed && !deleted {
                after.push(LocalTransition::Start);
            }
        }
        Some(VirtualTag::Completed) => {
            if !completed && !deleted {
                after.push(LocalTransition::Complete);
            }
        }
        Some(VirtualTag::Week) | Some(VirtualTag::Tomorrow) | None => {
            if waiting {
                wait = WaitChange::Clear;
            }
        }
    }

    Ok(LocalPlan {
        before,
        update: LocalUpdate {
            description: task.title.clone(),
            project: project.name.clone(),
            due: task.due(),
            wait,
            swimlane: Some(swimlane),
            category,
        },
        after,
    })
}
