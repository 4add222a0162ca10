use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::Store;
use crate::error::SyncError;
use crate::model::mapping::MappingTable;
use crate::model::project::{Assignee, ProjectSyncConfig};

const COLUMNS: &str = "name, url, user, apitoken, project_id, last_sync, mapping, \
                       run_ledger_sync, assignee_id, assignee_name";

fn from_row(row: &Row<'_>) -> rusqlite::Result<(ProjectSyncConfig, String)> {
    let assignee_id: Option<i64> = row.get(8)?;
    let assignee_name: Option<String> = row.get(9)?;
    let assignee = match (assignee_id, assignee_name) {
        (Some(id), Some(name)) => Some(Assignee { id, name }),
        _ => None,
    };
    let config = ProjectSyncConfig {
        name: row.get(0)?,
        url: row.get(1)?,
        user: row.get(2)?,
        apitoken: row.get(3)?,
        project_id: row.get(4)?,
        last_sync: row.get(5)?,
        mapping: MappingTable::default(),
        run_ledger_sync: row.get(7)?,
        assignee,
    };
    Ok((config, row.get(6)?))
}

fn with_mapping((mut config, mapping): (ProjectSyncConfig, String)) -> Result<ProjectSyncConfig, SyncError> {
    config.mapping = serde_json::from_str(&mapping)?;
    config.mapping.validate()?;
    Ok(config)
}

impl Store {
    pub fn list_projects(&self) -> Result<Vec<ProjectSyncConfig>, SyncError> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {COLUMNS} FROM projects ORDER BY name"))?;
        let rows = stmt
            .query_map([], from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(with_mapping).collect()
    }

    pub fn project(&self, name: &str) -> Result<Option<ProjectSyncConfig>, SyncError> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM projects WHERE name = ?1"),
                params![name],
                from_row,
            )
            .optional()?;
        row.map(with_mapping).transpose()
    }

    /// Inserts or replaces a project; the mapping must be one-to-one.
    pub fn save_project(&self, config: &ProjectSyncConfig) -> Result<(), SyncError> {
        config.mapping.validate()?;
        let mapping = serde_json::to_string(&config.mapping)?;
        self.conn().execute(
            &format!(
                "INSERT OR REPLACE INTO projects ({COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                config.name,
                config.url,
                config.user,
                config.apitoken,
                config.project_id,
                config.last_sync,
                mapping,
                config.run_ledger_sync,
                config.assignee.as_ref().map(|a| a.id),
                config.assignee.as_ref().map(|a| a.name.as_str()),
            ],
        )?;
        Ok(())
    }

    pub fn set_project_last_sync(&self, name: &str, at: DateTime<Utc>) -> Result<(), SyncError> {
        let changed = self.conn().execute(
            "UPDATE projects SET last_sync = ?1 WHERE name = ?2",
            params![at, name],
        )?;
        if changed == 0 {
            return Err(SyncError::ProjectNotConfigured(name.to_string()));
        }
        Ok(())
    }

    /// Drops the project link and its bookmarks; tasks are left alone.
    pub fn remove_project(&self, name: &str) -> Result<bool, SyncError> {
        let Some(config) = self.project(name)? else {
            return Ok(false);
        };
        self.conn().execute(
            "DELETE FROM sync_pairs WHERE collection = ?1",
            params![config.collection()],
        )?;
        self.conn()
            .execute("DELETE FROM projects WHERE name = ?1", params![name])?;
        Ok(true)
    }
}
