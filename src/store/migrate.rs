use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::info;

use crate::error::SyncError;

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 3;

const HISTORY_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_history (
    version INTEGER NOT NULL,
    min_version INTEGER NOT NULL,
    applied_at TEXT NOT NULL
)";

const BASE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS projects (
    name TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    user TEXT NOT NULL,
    apitoken TEXT NOT NULL,
    project_id INTEGER NOT NULL,
    last_sync TEXT NOT NULL,
    mapping TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sync_pairs (
    collection TEXT NOT NULL,
    local_id TEXT,
    remote_id INTEGER,
    last_sync TEXT NOT NULL,
    UNIQUE (collection, local_id),
    UNIQUE (collection, remote_id)
);
";

/// One additive schema step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    /// Oldest client version able to read the schema after this step.
    pub min_version: u32,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 2,
        min_version: 1,
        sql: "ALTER TABLE projects ADD COLUMN run_ledger_sync INTEGER NOT NULL DEFAULT 0;",
    },
    Migration {
        version: 3,
        min_version: 1,
        sql: "ALTER TABLE projects ADD COLUMN assignee_id INTEGER;
              ALTER TABLE projects ADD COLUMN assignee_name TEXT;",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    Fresh { version: u32 },
    UpToDate { version: u32 },
    Upgraded { from: u32, to: u32 },
}

pub struct Migrator<'a> {
    code_version: u32,
    base: &'a str,
    migrations: &'a [Migration],
}

impl Migrator<'static> {
    pub fn current() -> Self {
        Self::new(SCHEMA_VERSION, BASE_SCHEMA, MIGRATIONS)
    }
}

impl<'a> Migrator<'a> {
    pub fn new(code_version: u32, base: &'a str, migrations: &'a [Migration]) -> Self {
        Self {
            code_version,
            base,
            migrations,
        }
    }

    pub fn run(&self, conn: &mut Connection) -> Result<MigrationOutcome, SyncError> {
        conn.execute_batch(HISTORY_TABLE)?;

        let recorded: (Option<u32>, Option<u32>) = conn.query_row(
            "SELECT MAX(version), MAX(min_version) FROM schema_history",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let (Some(current), Some(required)) = recorded else {
            return self.install(conn);
        };

        if self.code_version < required {
            return Err(SyncError::SchemaTooNew {
                code: self.code_version,
                required,
            });
        }

        let mut pending: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| m.version > current && m.version <= self.code_version)
            .collect();
        pending.sort_by_key(|m| m.version);

        if pending.is_empty() {
            return Ok(MigrationOutcome::UpToDate { version: current });
        }

        let mut to = current;
        for migration in pending {
            let tx = conn.transaction()?;
            tx.execute_batch(migration.sql)?;
            tx.execute(
                "INSERT INTO schema_history (version, min_version, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.min_version, Utc::now()],
            )?;
            tx.commit()?;
            info!(version = migration.version, "Applied schema migration");
            to = migration.version;
        }
        Ok(MigrationOutcome::Upgraded { from: current, to })
    }

    /// Creates the whole current schema and stamps it as one history entry.
    fn install(&self, conn: &mut Connection) -> Result<MigrationOutcome, SyncError> {
        let tx = conn.transaction()?;
        tx.execute_batch(self.base)?;
        let mut min_version = 1;
        for migration in self.migrations.iter().filter(|m| m.version <= self.code_version) {
            tx.execute_batch(migration.sql)?;
            min_version = min_version.max(migration.min_version);
        }
        tx.execute(
            "INSERT INTO schema_history (version, min_version, applied_at) VALUES (?1, ?2, ?3)",
            params![self.code_version, min_version, Utc::now()],
        )?;
        tx.commit()?;
        info!(version = self.code_version, "Initialized sync database");
        Ok(MigrationOutcome::Fresh {
            version: self.code_version,
        })
    }
}
