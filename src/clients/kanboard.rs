use async_trait::async_trait;
use base64::Engine;
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::{BoardConnector, Connection, RemoteBoard};
use crate::config::RemoteConfig;
use crate::error::ClientError;
use crate::model::board::{BoardEntry, RemoteProject, RemoteTask, RemoteUser, TaskQuery};
use crate::model::mutation::{RemoteCreate, RemoteMove, RemoteUpdate};
use crate::model::project::ProjectSyncConfig;

/// JSON-RPC client for a Kanboard server.
pub struct KanboardClient {
    url: String,
    auth_header: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl KanboardClient {
    pub fn new(url: &str, user: &str, apitoken: &str, timeout: Duration) -> Result<Self, ClientError> {
        let creds = format!("{user}:{apitoken}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::from)?;
        Ok(Self {
            url: normalize_url(url),
            auth_header: format!("Basic {encoded}"),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Probes the endpoint and only hands out a client when it answers.
    pub async fn connect(
        url: &str,
        user: &str,
        apitoken: &str,
        settings: &RemoteConfig,
    ) -> Connection {
        let url = normalize_url(url);
        if let Err(reason) = probe(&url, Duration::from_secs(settings.probe_timeout_secs)).await {
            warn!(%url, "Kanboard server is not reachable, skipping");
            return Connection::Unavailable(reason);
        }
        match Self::new(&url, user, apitoken, Duration::from_secs(settings.timeout_secs)) {
            Ok(client) => Connection::Connected(Box::new(client)),
            Err(err) => Connection::Unavailable(err.to_string()),
        }
    }

    /// Calls `method`; `Ok(None)` when the server answers `null` or `false`.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "id": id,
            "params": params,
        });
        debug!(method, id, "kanboard call");

        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", &self.auth_header)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let reply: RpcResponse = resp.json().await?;
        if let Some(err) = reply.error {
            return Err(ClientError::Rejected(format!(
                "{method}: {} ({})",
                err.message, err.code
            )));
        }
        match reply.result {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Calls a mutation that answers `true` on success.
    async fn call_ok(&self, method: &str, params: Value) -> Result<(), ClientError> {
        match self.call::<Value>(method, params).await? {
            Some(_) => Ok(()),
            None => Err(ClientError::Rejected(format!("{method} returned false"))),
        }
    }

    async fn list_entries(&self, method: &str, project_id: i64) -> Result<Vec<BoardEntry>, ClientError> {
        let entries: Vec<KbEntry> = self
            .call(method, json!({ "project_id": project_id }))
            .await?
            .unwrap_or_default();
        Ok(entries.into_iter().map(BoardEntry::from).collect())
    }
}

/// Adds a scheme and the JSON-RPC endpoint when the user left them out.
pub fn normalize_url(url: &str) -> String {
    let mut url = url.trim().trim_end_matches('/').to_string();
    if !url.ends_with("/jsonrpc.php") {
        url.push_str("/jsonrpc.php");
    }
    if !url.starts_with("http") {
        url = format!("https://{url}");
    }
    url
}

async fn probe(url: &str, timeout: Duration) -> Result<(), String> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| e.to_string())?;
    match client.head(url).send().await {
        Ok(_) => Ok(()),
        Err(err) => Err(err.to_string()),
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Kanboard returns most integers as strings; accept both.
fn de_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Raw::Int(v)) => Ok(v),
        Some(Raw::Str(s)) if s.trim().is_empty() => Ok(0),
        Some(Raw::Str(s)) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
struct KbTask {
    #[serde(deserialize_with = "de_int")]
    id: i64,
    title: String,
    #[serde(default, deserialize_with = "de_int")]
    project_id: i64,
    #[serde(default, deserialize_with = "de_int")]
    date_due: i64,
    #[serde(default, deserialize_with = "de_int")]
    column_id: i64,
    #[serde(default, deserialize_with = "de_int")]
    swimlane_id: i64,
    #[serde(default, deserialize_with = "de_int")]
    category_id: i64,
    #[serde(default, deserialize_with = "de_int")]
    owner_id: i64,
    #[serde(default, deserialize_with = "de_int")]
    is_active: i64,
    #[serde(default, deserialize_with = "de_int")]
    date_modification: i64,
}

impl From<KbTask> for RemoteTask {
    fn from(task: KbTask) -> Self {
        RemoteTask {
            id: task.id,
            title: task.title,
            project_id: task.project_id,
            date_due: task.date_due,
            column_id: task.column_id,
            swimlane_id: task.swimlane_id,
            category_id: (task.category_id != 0).then_some(task.category_id),
            owner_id: (task.owner_id != 0).then_some(task.owner_id),
            is_open: task.is_active == 1,
            modified: DateTime::from_timestamp(task.date_modification, 0).unwrap_or_default(),
        }
    }
}

/// Columns carry a `title`, swimlanes and categories a `name`.
#[derive(Deserialize)]
struct KbEntry {
    #[serde(deserialize_with = "de_int")]
    id: i64,
    #[serde(alias = "title")]
    name: String,
}

impl From<KbEntry> for BoardEntry {
    fn from(entry: KbEntry) -> Self {
        BoardEntry {
            id: entry.id,
            name: entry.name,
        }
    }
}

#[derive(Deserialize)]
struct KbProject {
    #[serde(deserialize_with = "de_int")]
    id: i64,
    name: String,
}

#[derive(Deserialize)]
struct KbUser {
    #[serde(deserialize_with = "de_int")]
    id: i64,
    username: String,
}

fn create_params(request: &RemoteCreate) -> Value {
    let mut params = Map::new();
    params.insert("title".into(), json!(request.fields.title));
    params.insert("project_id".into(), json!(request.project_id));
    if let Some(due) = &request.fields.due {
        params.insert("date_due".into(), json!(due));
    }
    if let Some(owner) = request.fields.owner_id {
        params.insert("owner_id".into(), json!(owner));
    }
    if let Some(category) = request.fields.category_id {
        params.insert("category_id".into(), json!(category));
    }
    if let Some(column) = request.column_id {
        params.insert("column_id".into(), json!(column));
    }
    if let Some(swimlane) = request.swimlane_id {
        params.insert("swimlane_id".into(), json!(swimlane));
    }
    Value::Object(params)
}

fn update_params(request: &RemoteUpdate) -> Value {
    let mut params = Map::new();
    params.insert("id".into(), json!(request.task_id));
    if let Some(title) = &request.title {
        params.insert("title".into(), json!(title));
    }
    if let Some(due) = &request.due {
        params.insert("date_due".into(), json!(due));
    }
    if let Some(category) = request.category_id {
        params.insert("category_id".into(), json!(category));
    }
    Value::Object(params)
}

#[async_trait]
impl RemoteBoard for KanboardClient {
    async fn find_project_by_name(&self, name: &str) -> Result<RemoteProject, ClientError> {
        let project: KbProject = self
            .call("getProjectByName", json!({ "name": name }))
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("project {name}")))?;
        Ok(RemoteProject {
            id: project.id,
            name: project.name,
        })
    }

    async fn find_user_by_name(&self, username: &str) -> Result<RemoteUser, ClientError> {
        let user: KbUser = self
            .call("getUserByName", json!({ "username": username }))
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("user {username}")))?;
        Ok(RemoteUser {
            id: user.id,
            username: user.username,
        })
    }

    async fn list_columns(&self, project_id: i64) -> Result<Vec<BoardEntry>, ClientError> {
        self.list_entries("getColumns", project_id).await
    }

    async fn list_swimlanes(&self, project_id: i64) -> Result<Vec<BoardEntry>, ClientError> {
        self.list_entries("getActiveSwimlanes", project_id).await
    }

    async fn list_categories(&self, project_id: i64) -> Result<Vec<BoardEntry>, ClientError> {
        self.list_entries("getAllCategories", project_id).await
    }

    async fn search_tasks(
        &self,
        project_id: i64,
        query: &TaskQuery,
    ) -> Result<Vec<RemoteTask>, ClientError> {
        let tasks: Vec<KbTask> = self
            .call(
                "searchTasks",
                json!({ "project_id": project_id, "query": query.to_query_string() }),
            )
            .await?
            .unwrap_or_default();
        Ok(tasks.into_iter().map(RemoteTask::from).collect())
    }

    async fn get_task(&self, id: i64) -> Result<RemoteTask, ClientError> {
        let task: KbTask = self
            .call("getTask", json!({ "task_id": id }))
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("board task {id}")))?;
        Ok(task.into())
    }

    async fn create_task(&self, request: &RemoteCreate) -> Result<i64, ClientError> {
        let id: Value = self
            .call("createTask", create_params(request))
            .await?
            .ok_or_else(|| ClientError::Rejected(format!("createTask {}", request.fields.title)))?;
        parse_id(&id)
    }

    async fn update_task(&self, request: &RemoteUpdate) -> Result<(), ClientError> {
        self.call_ok("updateTask", update_params(request)).await
    }

    async fn move_task(&self, request: &RemoteMove) -> Result<(), ClientError> {
        self.call_ok(
            "moveTaskPosition",
            json!({
                "project_id": request.project_id,
                "task_id": request.task_id,
                "column_id": request.column_id,
                "position": request.position,
                "swimlane_id": request.swimlane_id,
            }),
        )
        .await
    }

    async fn close_task(&self, id: i64) -> Result<(), ClientError> {
        self.call_ok("closeTask", json!({ "task_id": id })).await
    }

    async fn open_task(&self, id: i64) -> Result<(), ClientError> {
        self.call_ok("openTask", json!({ "task_id": id })).await
    }

    async fn duplicate_task_to_project(
        &self,
        id: i64,
        project_id: i64,
    ) -> Result<i64, ClientError> {
        let copy: Value = self
            .call(
                "duplicateTaskToProject",
                json!({ "task_id": id, "project_id": project_id }),
            )
            .await?
            .ok_or_else(|| ClientError::Rejected(format!("duplicateTaskToProject {id}")))?;
        parse_id(&copy)
    }

    async fn remove_task(&self, id: i64) -> Result<(), ClientError> {
        self.call_ok("removeTask", json!({ "task_id": id })).await
    }
}

fn parse_id(value: &Value) -> Result<i64, ClientError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ClientError::Protocol(format!("task id {n}"))),
        Value::String(s) => s
            .parse()
            .map_err(|_| ClientError::Protocol(format!("task id {s}"))),
        other => Err(ClientError::Protocol(format!("task id {other}"))),
    }
}

/// Connects to each project's own Kanboard endpoint.
pub struct KanboardConnector {
    settings: RemoteConfig,
}

impl KanboardConnector {
    pub fn new(settings: RemoteConfig) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl BoardConnector for KanboardConnector {
    async fn connect(&self, project: &ProjectSyncConfig) -> Connection {
        KanboardClient::connect(&project.url, &project.user, &project.apitoken, &self.settings).await
    }
}
