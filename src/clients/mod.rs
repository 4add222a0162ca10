pub mod kanboard;
pub mod taskwarrior;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::model::board::{BoardEntry, RemoteProject, RemoteTask, RemoteUser, TaskQuery};
use crate::model::local::{LocalFilter, LocalTask};
use crate::model::mutation::{LocalUpdate, RemoteCreate, RemoteMove, RemoteUpdate};
use crate::model::project::ProjectSyncConfig;

/// The remote kanban board. Deletion is physical; there are no tombstones.
#[async_trait]
pub trait RemoteBoard: Send + Sync {
    async fn find_project_by_name(&self, name: &str) -> Result<RemoteProject, ClientError>;
    async fn find_user_by_name(&self, username: &str) -> Result<RemoteUser, ClientError>;
    async fn list_columns(&self, project_id: i64) -> Result<Vec<BoardEntry>, ClientError>;
    async fn list_swimlanes(&self, project_id: i64) -> Result<Vec<BoardEntry>, ClientError>;
    async fn list_categories(&self, project_id: i64) -> Result<Vec<BoardEntry>, ClientError>;
    async fn search_tasks(
        &self,
        project_id: i64,
        query: &TaskQuery,
    ) -> Result<Vec<RemoteTask>, ClientError>;
    async fn get_task(&self, id: i64) -> Result<RemoteTask, ClientError>;
    /// Returns the id of the new task.
    async fn create_task(&self, request: &RemoteCreate) -> Result<i64, ClientError>;
    async fn update_task(&self, request: &RemoteUpdate) -> Result<(), ClientError>;
    async fn move_task(&self, request: &RemoteMove) -> Result<(), ClientError>;
    async fn close_task(&self, id: i64) -> Result<(), ClientError>;
    async fn open_task(&self, id: i64) -> Result<(), ClientError>;
    /// Returns the id of the copy.
    async fn duplicate_task_to_project(
        &self,
        id: i64,
        project_id: i64,
    ) -> Result<i64, ClientError>;
    async fn remove_task(&self, id: i64) -> Result<(), ClientError>;
}

/// The local personal task store. Deletion sets a durable flag.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn list_tasks(&self, filter: &LocalFilter) -> Result<Vec<LocalTask>, ClientError>;
    async fn get_task(&self, uuid: &str) -> Result<LocalTask, ClientError>;
    async fn create_task(&self, update: &LocalUpdate) -> Result<LocalTask, ClientError>;
    async fn save(&self, uuid: &str, update: &LocalUpdate) -> Result<(), ClientError>;
    async fn start(&self, uuid: &str) -> Result<(), ClientError>;
    async fn stop(&self, uuid: &str) -> Result<(), ClientError>;
    async fn complete(&self, uuid: &str) -> Result<(), ClientError>;
    async fn delete(&self, uuid: &str) -> Result<(), ClientError>;
    /// Pushes/pulls the store's own remote ledger, if it has one.
    async fn sync_ledger(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Outcome of probing a board endpoint before a cycle.
pub enum Connection {
    Connected(Box<dyn RemoteBoard>),
    Unavailable(String),
}

/// Builds a board client for a project, once per cycle.
#[async_trait]
pub trait BoardConnector: Send + Sync {
    async fn connect(&self, project: &ProjectSyncConfig) -> Connection;
}

#[cfg(test)]
pub mod fake;

#[cfg(test)]
mod tests;
