pub mod bookmarks;
pub mod migrate;
pub mod projects;

use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

use crate::error::SyncError;
use migrate::{MigrationOutcome, Migrator};

/// SQLite-backed storage for project configs and sync bookmarks.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if needed) the database and brings its schema up to date.
    pub fn open(path: &Path) -> Result<Self, SyncError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, SyncError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self, SyncError> {
        let outcome: MigrationOutcome = Migrator::current().run(&mut conn)?;
        debug!(?outcome, "schema checked");
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}
