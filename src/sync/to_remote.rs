//! Local task → board mutation.

use tracing::{debug, warn};

use super::TranslateContext;
use crate::error::SyncError;
use crate::model::local::LocalTask;
use crate::model::mapping::{MappingTable, VirtualTag};
use crate::model::mutation::{Lifecycle, RemoteFields};
use crate::model::project::ProjectSyncConfig;

/// Everything the board should look like after pushing one local task.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePlan {
    pub fields: RemoteFields,
    pub column_id: Option<i64>,
    pub swimlane_id: Option<i64>,
    /// Explicit open/close issued after the update.
    pub lifecycle: Option<Lifecycle>,
}

/// Picks the virtual tag for a local task, first matching rule wins.
pub fn resolve_tag(
    task: &LocalTask,
    mapping: &MappingTable,
    ctx: &TranslateContext,
) -> (Option<VirtualTag>, Option<Lifecycle>) {
    if task.active {
        return (Some(VirtualTag::Active), Some(Lifecycle::Open));
    }
    if task.completed {
        return (Some(VirtualTag::Completed), Some(Lifecycle::Close));
    }
    if task.is_waiting(ctx.now) {
        return (Some(VirtualTag::Waiting), None);
    }
    let Some(due) = task.due.map(|d| ctx.local_date(d)) else {
        return (None, None);
    };
    if mapping.columns.contains(&VirtualTag::Week) && ctx.same_iso_week(due, ctx.today()) {
        return (Some(VirtualTag::Week), None);
    }
    if mapping.columns.contains(&VirtualTag::Tomorrow) && ctx.today().succ_opt() == Some(due) {
        return (Some(VirtualTag::Tomorrow), None);
    }
    (None, None)
}

pub fn plan_remote(
    task: &LocalTask,
    project: &ProjectSyncConfig,
    ctx: &TranslateContext,
) -> Result<RemotePlan, SyncError> {
    let mapping = &project.mapping;

    let (tag, lifecycle) = resolve_tag(task, mapping, ctx);
    let column_id = tag.and_then(|tag| {
        let id = mapping.column_id(tag);
        if id.is_none() {
            debug!(%tag, uuid = %task.uuid, "no column mapped, keeping column");
        }
        id
    });

    let swimlane_id = match &task.swimlane {
        None => None,
        Some(alias) => Some(
            mapping
                .swimlanes
                .remote_for(alias.as_str())
                .map(|r| r.id)
                .ok_or_else(|| SyncError::SwimlaneUnmapped(format!("local swimlane {alias}")))?,
        ),
    };

    let category_id = task.category.as_deref().and_then(|alias| {
        let id = mapping.categories.remote_for(alias).map(|r| r.id);
        if id.is_none() {
            warn!(category = alias, uuid = %task.uuid, "local category not found in mapping, ignoring");
        }
        id
    });

    Ok(RemotePlan {
        fields: RemoteFields {
            title: task.description.clone(),
            due: task.due.map(|d| ctx.format_remote_due(d)),
            owner_id: project.assignee.as_ref().map(|a| a.id),
            category_id,
        },
        column_id,
        swimlane_id,
        lifecycle,
    })
}
