//! Interactive linking of a Kanboard project to the local task store.

use anyhow::{bail, Context, Result};
use dialoguer::{Confirm, Input, Select};
use tracing::{info, warn};

use crate::clients::kanboard::{normalize_url, KanboardClient};
use crate::clients::taskwarrior::TaskwarriorClient;
use crate::clients::{Connection, RemoteBoard};
use crate::config::RemoteConfig;
use crate::error::SyncError;
use crate::model::board::BoardEntry;
use crate::model::mapping::{AliasMap, MappingTable, RemoteRef, VirtualTag};
use crate::model::project::{Assignee, ProjectSyncConfig};
use crate::store::Store;
use crate::util::dates::sync_epoch;

const DO_NOT_SET: &str = "Do not set";

pub async fn configure_project(
    store: &Store,
    name: &str,
    settings: &RemoteConfig,
    taskwarrior: &TaskwarriorClient,
) -> Result<()> {
    let existing = store.project(name)?;
    if existing.is_none() {
        let create = Confirm::new()
            .with_prompt(format!(
                "Project mapping {name} does not exist yet, create a new mapping?"
            ))
            .default(true)
            .interact()?;
        if !create {
            info!("Not creating a new project mapping");
            return Ok(());
        }
    }
    let previous = existing.unwrap_or_else(|| ProjectSyncConfig::new(name, "", 0));

    let url: String = Input::new()
        .with_prompt("Kanboard server address")
        .with_initial_text(previous.url.clone())
        .interact_text()?;
    let user: String = Input::new()
        .with_prompt("Kanboard username")
        .with_initial_text(previous.user.clone())
        .interact_text()?;
    let apitoken: String = Input::new()
        .with_prompt("Personal Kanboard API token (My profile -> API)")
        .with_initial_text(previous.apitoken.clone())
        .interact_text()?;
    let assignee_name: String = Input::new()
        .with_prompt("Only sync tasks assigned to (empty for all tasks)")
        .with_initial_text(previous.assignee.as_ref().map(|a| a.name.clone()).unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    let run_ledger_sync = Confirm::new()
        .with_prompt("Run 'task sync' before each sync?")
        .default(previous.run_ledger_sync)
        .interact()?;

    let url = normalize_url(&url);
    let remote = match KanboardClient::connect(&url, &user, &apitoken, settings).await {
        Connection::Connected(remote) => remote,
        Connection::Unavailable(reason) => bail!("Kanboard server {url} is unreachable: {reason}"),
    };

    let board_project = match remote.find_project_by_name(name).await {
        Ok(project) => project,
        Err(err) if err.is_not_found() => bail!(
            "Can not find kanboard project named {name}. Does it exist and do you have access?"
        ),
        Err(err) => return Err(err).context("Failed to look up the Kanboard project"),
    };

    let assignee_name = assignee_name.trim();
    let assignee = if assignee_name.is_empty() {
        None
    } else {
        let user = remote
            .find_user_by_name(assignee_name)
            .await
            .with_context(|| format!("Can not find Kanboard user {assignee_name}"))?;
        Some(Assignee {
            id: user.id,
            name: user.username,
        })
    };

    let mapping = ask_mapping(remote.as_ref(), board_project.id, &previous.mapping).await?;

    let project = ProjectSyncConfig {
        name: name.to_string(),
        url,
        user,
        apitoken,
        project_id: board_project.id,
        assignee,
        run_ledger_sync,
        last_sync: sync_epoch(),
        mapping,
    };
    store.save_project(&project)?;
    taskwarrior
        .register_attribute_values(&project.mapping)
        .await
        .context("Failed to register Taskwarrior attributes")?;

    println!("Linked {name} to Kanboard project {}.", board_project.id);
    Ok(())
}

async fn ask_mapping(
    remote: &dyn RemoteBoard,
    project_id: i64,
    previous: &MappingTable,
) -> Result<MappingTable> {
    let categories = remote.list_categories(project_id).await?;
    let mut aliases = Vec::with_capacity(categories.len());
    for entry in &categories {
        aliases.push(ask_alias(entry, &previous.categories, "category")?);
    }
    let categories = alias_map("category", &categories, aliases)?;

    let swimlanes = remote.list_swimlanes(project_id).await?;
    let mut aliases = Vec::with_capacity(swimlanes.len());
    for entry in &swimlanes {
        aliases.push(ask_alias(entry, &previous.swimlanes, "swimlane")?);
    }
    let swimlanes = alias_map("swimlane", &swimlanes, aliases)?;

    let columns = remote.list_columns(project_id).await?;
    let mut remaining = VirtualTag::ALL.to_vec();
    let mut tags = Vec::with_capacity(columns.len());
    for entry in &columns {
        let choices = column_choices(&remaining);
        let default = default_choice(&remaining, previous.tag_for_column(entry.id));
        let picked = Select::new()
            .with_prompt(format!("Local status for Kanboard column {}", entry.name))
            .items(&choices)
            .default(default)
            .interact()?;
        let tag = remaining.get(picked).copied();
        if let Some(tag) = tag {
            remaining.retain(|t| *t != tag);
        }
        tags.push(tag);
    }
    let columns = column_map(&columns, &tags)?;

    let mapping = MappingTable {
        columns,
        swimlanes,
        categories,
    };
    mapping.validate()?;
    if mapping.swimlanes.is_empty() {
        warn!("No swimlane aliases defined; board tasks cannot be pulled without one");
    }
    Ok(mapping)
}

fn ask_alias(entry: &BoardEntry, previous: &AliasMap<String>, kind: &str) -> Result<String> {
    let alias: String = Input::new()
        .with_prompt(format!("Taskwarrior alias for Kanboard {kind} {}", entry.name))
        .default(default_alias(entry, previous))
        .interact_text()?;
    Ok(alias.trim().to_string())
}

/// The alias used last time for this board id, else the board name.
pub fn default_alias(entry: &BoardEntry, previous: &AliasMap<String>) -> String {
    previous
        .alias_for(entry.id)
        .cloned()
        .unwrap_or_else(|| entry.name.clone())
}

pub fn alias_map(
    dictionary: &'static str,
    entries: &[BoardEntry],
    aliases: Vec<String>,
) -> Result<AliasMap<String>, SyncError> {
    let mut map = AliasMap::default();
    for (entry, alias) in entries.iter().zip(aliases) {
        map.insert(dictionary, alias, RemoteRef::new(entry.id, entry.name.clone()))?;
    }
    Ok(map)
}

/// Unused tags first, then the opt-out.
pub fn column_choices(remaining: &[VirtualTag]) -> Vec<String> {
    remaining
        .iter()
        .map(|t| t.to_string())
        .chain(std::iter::once(DO_NOT_SET.to_string()))
        .collect()
}

pub fn default_choice(remaining: &[VirtualTag], previous: Option<VirtualTag>) -> usize {
    previous
        .and_then(|tag| remaining.iter().position(|t| *t == tag))
        .unwrap_or(0)
}

pub fn column_map(
    entries: &[BoardEntry],
    tags: &[Option<VirtualTag>],
) -> Result<AliasMap<VirtualTag>, SyncError> {
    let mut map = AliasMap::default();
    for (entry, tag) in entries.iter().zip(tags) {
        if let Some(tag) = tag {
            map.insert("column", *tag, RemoteRef::new(entry.id, entry.name.clone()))?;
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, name: &str) -> BoardEntry {
        BoardEntry {
            id,
            name: name.into(),
        }
    }

    #[test]
    fn previous_alias_is_offered_again() {
        let mut previous = AliasMap::default();
        previous
            .insert("swimlane", "office".to_string(), RemoteRef::new(1, "Default swimlane"))
            .unwrap();
        assert_eq!(default_alias(&entry(1, "Default swimlane"), &previous), "office");
        assert_eq!(default_alias(&entry(2, "Garden"), &previous), "Garden");
    }

    #[test]
    fn duplicate_aliases_are_rejected() {
        let entries = [entry(1, "Bugs"), entry(2, "Features")];
        let err = alias_map("category", &entries, vec!["work".into(), "work".into()]).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateMapping { .. }));

        let map = alias_map("category", &entries, vec!["bug".into(), "feature".into()]).unwrap();
        assert_eq!(map.remote_for("feature").map(|r| r.id), Some(2));
    }

    #[test]
    fn used_tags_leave_the_choice_list() {
        let mut remaining = VirtualTag::ALL.to_vec();
        assert_eq!(column_choices(&remaining).len(), 6);
        assert_eq!(column_choices(&remaining).last().map(String::as_str), Some(DO_NOT_SET));
        remaining.retain(|t| *t != VirtualTag::Active);
        let choices = column_choices(&remaining);
        assert!(!choices.contains(&"ACTIVE".to_string()));
        assert_eq!(default_choice(&remaining, Some(VirtualTag::Week)), 1);
        assert_eq!(default_choice(&remaining, Some(VirtualTag::Active)), 0);
    }

    #[test]
    fn skipped_columns_are_not_mapped() {
        let entries = [entry(1, "Backlog"), entry(2, "Ready"), entry(3, "Doing")];
        let map = column_map(
            &entries,
            &[Some(VirtualTag::Waiting), None, Some(VirtualTag::Active)],
        )
        .unwrap();
        assert_eq!(map.iter().count(), 2);
        assert_eq!(map.alias_for(3), Some(&VirtualTag::Active));
        assert_eq!(map.alias_for(2), None);
    }
}
