//! In-memory board and task store that record every call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::{BoardConnector, Connection, LocalStore, RemoteBoard};
use crate::error::ClientError;
use crate::model::board::{BoardEntry, RemoteProject, RemoteTask, RemoteUser, TaskQuery};
use crate::model::local::{LocalFilter, LocalTask};
use crate::model::mutation::{LocalUpdate, RemoteCreate, RemoteMove, RemoteUpdate, WaitChange};
use crate::model::project::ProjectSyncConfig;

const READ_CALLS: &[&str] = &["find_project", "find_user", "list_", "search", "get_task"];

fn is_mutation(call: &str) -> bool {
    !READ_CALLS.iter().any(|prefix| call.starts_with(prefix))
}

#[derive(Default)]
struct BoardState {
    tasks: BTreeMap<i64, RemoteTask>,
    next_id: i64,
    calls: Vec<String>,
    fail_auth: bool,
    reject_moves: bool,
    reject_creates: bool,
}

/// A board kept in memory; every mutation stamps `modified = now`.
#[derive(Clone, Default)]
pub struct FakeBoard {
    state: Arc<Mutex<BoardState>>,
}

impl FakeBoard {
    pub fn new() -> Self {
        let board = Self::default();
        board.state.lock().unwrap().next_id = 100;
        board
    }

    pub fn with_auth_failure(self) -> Self {
        self.state.lock().unwrap().fail_auth = true;
        self
    }

    pub fn with_rejected_moves(self) -> Self {
        self.state.lock().unwrap().reject_moves = true;
        self
    }

    pub fn with_rejected_creates(self) -> Self {
        self.state.lock().unwrap().reject_creates = true;
        self
    }

    pub fn insert(&self, task: RemoteTask) {
        self.state.lock().unwrap().tasks.insert(task.id, task);
    }

    pub fn task(&self, id: i64) -> Option<RemoteTask> {
        self.state.lock().unwrap().tasks.get(&id).cloned()
    }

    pub fn tasks(&self) -> Vec<RemoteTask> {
        self.state.lock().unwrap().tasks.values().cloned().collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<String> {
        self.calls().into_iter().filter(|c| is_mutation(c)).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn record(&self, call: String) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_auth {
            return Err(ClientError::Auth("401 Unauthorized".into()));
        }
        state.calls.push(call);
        Ok(())
    }

    fn modify(&self, id: i64, f: impl FnOnce(&mut RemoteTask)) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        let task = state
            .tasks
            .get_mut(&id)
            .ok_or_else(|| ClientError::NotFound(format!("board task {id}")))?;
        f(&mut *task);
        task.modified = Utc::now();
        Ok(())
    }
}

pub fn remote_task(id: i64, title: &str, column_id: i64, modified: DateTime<Utc>) -> RemoteTask {
    RemoteTask {
        id,
        title: title.into(),
        project_id: 1,
        date_due: 0,
        column_id,
        swimlane_id: 1,
        category_id: None,
        owner_id: None,
        is_open: true,
        modified,
    }
}

#[async_trait]
impl RemoteBoard for FakeBoard {
    async fn find_project_by_name(&self, name: &str) -> Result<RemoteProject, ClientError> {
        self.record(format!("find_project {name}"))?;
        Ok(RemoteProject {
            id: 1,
            name: name.into(),
        })
    }

    async fn find_user_by_name(&self, username: &str) -> Result<RemoteUser, ClientError> {
        self.record(format!("find_user {username}"))?;
        Ok(RemoteUser {
            id: 9,
            username: username.into(),
        })
    }

    async fn list_columns(&self, _project_id: i64) -> Result<Vec<BoardEntry>, ClientError> {
        self.record("list_columns".into())?;
        Ok(vec![])
    }

    async fn list_swimlanes(&self, _project_id: i64) -> Result<Vec<BoardEntry>, ClientError> {
        self.record("list_swimlanes".into())?;
        Ok(vec![])
    }

    async fn list_categories(&self, _project_id: i64) -> Result<Vec<BoardEntry>, ClientError> {
        self.record("list_categories".into())?;
        Ok(vec![])
    }

    async fn search_tasks(
        &self,
        project_id: i64,
        query: &TaskQuery,
    ) -> Result<Vec<RemoteTask>, ClientError> {
        self.record(format!("search {project_id}"))?;
        let state = self.state.lock().unwrap();
        Ok(state
            .tasks
            .values()
            .filter(|t| t.project_id == project_id && t.modified >= query.modified_since)
            .cloned()
            .collect())
    }

    async fn get_task(&self, id: i64) -> Result<RemoteTask, ClientError> {
        self.record(format!("get_task {id}"))?;
        self.task(id)
            .ok_or_else(|| ClientError::NotFound(format!("board task {id}")))
    }

    async fn create_task(&self, request: &RemoteCreate) -> Result<i64, ClientError> {
        self.record(format!("create {}", request.fields.title))?;
        let mut state = self.state.lock().unwrap();
        if state.reject_creates {
            return Err(ClientError::Rejected("createTask returned false".into()));
        }
        state.next_id += 1;
        let id = state.next_id;
        let mut task = remote_task(id, &request.fields.title, request.column_id.unwrap_or(1), Utc::now());
        task.project_id = request.project_id;
        task.swimlane_id = request.swimlane_id.unwrap_or(1);
        task.category_id = request.fields.category_id;
        task.owner_id = request.fields.owner_id;
        state.tasks.insert(id, task);
        Ok(id)
    }

    async fn update_task(&self, request: &RemoteUpdate) -> Result<(), ClientError> {
        self.record(format!("update {}", request.task_id))?;
        self.modify(request.task_id, |task| {
            if let Some(title) = &request.title {
                task.title = title.clone();
            }
            if let Some(category) = request.category_id {
                task.category_id = Some(category);
            }
        })
    }

    async fn move_task(&self, request: &RemoteMove) -> Result<(), ClientError> {
        self.record(format!(
            "move {} column={} swimlane={}",
            request.task_id, request.column_id, request.swimlane_id
        ))?;
        if self.state.lock().unwrap().reject_moves {
            return Err(ClientError::Rejected("moveTaskPosition returned false".into()));
        }
        self.modify(request.task_id, |task| {
            task.column_id = request.column_id;
            task.swimlane_id = request.swimlane_id;
        })
    }

    async fn close_task(&self, id: i64) -> Result<(), ClientError> {
        self.record(format!("close {id}"))?;
        self.modify(id, |task| task.is_open = false)
    }

    async fn open_task(&self, id: i64) -> Result<(), ClientError> {
        self.record(format!("open {id}"))?;
        self.modify(id, |task| task.is_open = true)
    }

    async fn duplicate_task_to_project(
        &self,
        id: i64,
        project_id: i64,
    ) -> Result<i64, ClientError> {
        self.record(format!("duplicate {id}"))?;
        let mut state = self.state.lock().unwrap();
        let mut copy = state
            .tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("board task {id}")))?;
        state.next_id += 1;
        copy.id = state.next_id;
        copy.project_id = project_id;
        copy.modified = Utc::now();
        state.tasks.insert(copy.id, copy.clone());
        Ok(copy.id)
    }

    async fn remove_task(&self, id: i64) -> Result<(), ClientError> {
        self.record(format!("remove {id}"))?;
        self.state.lock().unwrap().tasks.remove(&id);
        Ok(())
    }
}

#[derive(Default)]
struct LocalState {
    tasks: BTreeMap<String, LocalTask>,
    next_id: u64,
    calls: Vec<String>,
}

/// A local task store kept in memory.
#[derive(Clone, Default)]
pub struct FakeLocal {
    state: Arc<Mutex<LocalState>>,
}

pub fn local_task(uuid: &str, description: &str, modified: DateTime<Utc>) -> LocalTask {
    LocalTask {
        uuid: uuid.into(),
        description: description.into(),
        project: Some("Work".into()),
        due: None,
        active: false,
        completed: false,
        deleted: false,
        wait: None,
        recurring: false,
        swimlane: None,
        category: None,
        modified,
    }
}

impl FakeLocal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: LocalTask) {
        self.state.lock().unwrap().tasks.insert(task.uuid.clone(), task);
    }

    pub fn task(&self, uuid: &str) -> Option<LocalTask> {
        self.state.lock().unwrap().tasks.get(uuid).cloned()
    }

    pub fn tasks(&self) -> Vec<LocalTask> {
        self.state.lock().unwrap().tasks.values().cloned().collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<String> {
        self.calls().into_iter().filter(|c| is_mutation(c)).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn modify(&self, uuid: &str, f: impl FnOnce(&mut LocalTask)) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        let task = state
            .tasks
            .get_mut(uuid)
            .ok_or_else(|| ClientError::NotFound(format!("local task {uuid}")))?;
        f(&mut *task);
        task.modified = Utc::now();
        Ok(())
    }
}

fn apply(task: &mut LocalTask, update: &LocalUpdate) {
    task.description = update.description.clone();
    task.project = Some(update.project.clone());
    if let Some(due) = update.due {
        task.due = Some(due);
    }
    match update.wait {
        WaitChange::Keep => {}
        WaitChange::Clear => task.wait = None,
        WaitChange::Until(until) => task.wait = Some(until),
    }
    if let Some(swimlane) = &update.swimlane {
        task.swimlane = Some(swimlane.clone());
    }
    if let Some(category) = &update.category {
        task.category = Some(category.clone());
    }
}

#[async_trait]
impl LocalStore for FakeLocal {
    async fn list_tasks(&self, filter: &LocalFilter) -> Result<Vec<LocalTask>, ClientError> {
        self.record(format!("list_tasks {}", filter.project));
        let state = self.state.lock().unwrap();
        Ok(state
            .tasks
            .values()
            .filter(|t| t.project.as_deref() == Some(filter.project.as_str()))
            .filter(|t| t.modified > filter.modified_after)
            .cloned()
            .collect())
    }

    async fn get_task(&self, uuid: &str) -> Result<LocalTask, ClientError> {
        self.record(format!("get_task {uuid}"));
        self.task(uuid)
            .ok_or_else(|| ClientError::NotFound(format!("local task {uuid}")))
    }

    async fn create_task(&self, update: &LocalUpdate) -> Result<LocalTask, ClientError> {
        self.record(format!("create {}", update.description));
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let uuid = format!("00000000-0000-4000-8000-{:012}", state.next_id);
        let mut task = local_task(&uuid, &update.description, Utc::now());
        apply(&mut task, update);
        state.tasks.insert(uuid, task.clone());
        Ok(task)
    }

    async fn save(&self, uuid: &str, update: &LocalUpdate) -> Result<(), ClientError> {
        self.record(format!("save {uuid}"));
        self.modify(uuid, |task| apply(task, update))
    }

    async fn start(&self, uuid: &str) -> Result<(), ClientError> {
        self.record(format!("start {uuid}"));
        self.modify(uuid, |task| task.active = true)
    }

    async fn stop(&self, uuid: &str) -> Result<(), ClientError> {
        self.record(format!("stop {uuid}"));
        self.modify(uuid, |task| task.active = false)
    }

    async fn complete(&self, uuid: &str) -> Result<(), ClientError> {
        self.record(format!("complete {uuid}"));
        self.modify(uuid, |task| {
            task.active = false;
            task.completed = true;
        })
    }

    async fn delete(&self, uuid: &str) -> Result<(), ClientError> {
        self.record(format!("delete {uuid}"));
        self.modify(uuid, |task| task.deleted = true)
    }
}

/// Hands out clones of one fake board, or reports it unreachable.
pub struct FakeConnector {
    pub board: FakeBoard,
    pub reachable: bool,
}

#[async_trait]
impl BoardConnector for FakeConnector {
    async fn connect(&self, _project: &ProjectSyncConfig) -> Connection {
        if self.reachable {
            Connection::Connected(Box::new(self.board.clone()))
        } else {
            Connection::Unavailable("connection refused".into())
        }
    }
}
