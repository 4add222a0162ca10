use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::LocalStore;
use crate::config::LocalConfig;
use crate::error::ClientError;
use crate::model::local::{LocalFilter, LocalTask};
use crate::model::mapping::MappingTable;
use crate::model::mutation::{LocalUpdate, WaitChange};
use crate::util::dates::{format_taskwarrior, parse_taskwarrior};

/// User-defined attribute holding the swimlane alias.
pub const SWIMLANE_UDA: &str = "swimlane";
/// User-defined attribute holding the category alias.
pub const CATEGORY_UDA: &str = "kbcat";

/// Drives the `task` command line.
pub struct TaskwarriorClient {
    binary: String,
    timeout: Duration,
}

impl TaskwarriorClient {
    pub fn new(settings: &LocalConfig) -> Self {
        Self {
            binary: settings.binary.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    async fn run(&self, args: &[String], stdin: Option<&[u8]>) -> Result<Vec<u8>, ClientError> {
        debug!(args = %args.join(" "), "task");
        let mut child = tokio::process::Command::new(&self.binary)
            .arg("rc.confirmation=off")
            .arg("rc.verbose=nothing")
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let pipe = child.stdin.take();
        let exchange = async {
            if let (Some(input), Some(mut pipe)) = (stdin, pipe) {
                pipe.write_all(input).await?;
            }
            Ok::<_, std::io::Error>(child.wait_with_output().await?)
        };

        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ClientError::Unreachable(format!("{} (timed out)", self.binary)))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClientError::Rejected(format!(
                "task {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn export_raw(&self, uuid: &str) -> Result<Map<String, Value>, ClientError> {
        let out = self.run(&[uuid.to_string(), "export".into()], None).await?;
        let tasks: Vec<Map<String, Value>> = serde_json::from_slice(&out)?;
        tasks
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound(format!("local task {uuid}")))
    }

    async fn import(&self, task: &Map<String, Value>) -> Result<(), ClientError> {
        let body = serde_json::to_vec(&Value::Array(vec![Value::Object(task.clone())]))?;
        self.run(&["import".into()], Some(&body)).await?;
        Ok(())
    }

    async fn command(&self, uuid: &str, verb: &str) -> Result<(), ClientError> {
        self.run(&[uuid.to_string(), verb.to_string()], None).await?;
        Ok(())
    }

    async fn config_value(&self, key: &str) -> Result<String, ClientError> {
        let out = self.run(&["_get".into(), format!("rc.{key}")], None).await?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.run(&["config".into(), key.into(), value.into()], None)
            .await?;
        Ok(())
    }

    /// Declares the swimlane and category attributes with the mapped aliases
    /// as allowed values, keeping any values declared before.
    pub async fn register_attribute_values(&self, mapping: &MappingTable) -> Result<(), ClientError> {
        let attributes = [
            (SWIMLANE_UDA, "kbSwim", mapping.swimlanes.iter().map(|(a, _)| a.clone()).collect::<Vec<_>>()),
            (CATEGORY_UDA, "kbCat", mapping.categories.iter().map(|(a, _)| a.clone()).collect()),
        ];
        for (uda, label, aliases) in attributes {
            if aliases.is_empty() {
                continue;
            }
            let existing = self.config_value(&format!("uda.{uda}.values")).await?;
            let values = merge_values(&existing, &aliases);
            self.set_config(&format!("uda.{uda}.type"), "string").await?;
            self.set_config(&format!("uda.{uda}.label"), label).await?;
            self.set_config(&format!("uda.{uda}.values"), &values).await?;
        }
        Ok(())
    }
}

fn merge_values(existing: &str, aliases: &[String]) -> String {
    let mut values: Vec<String> = existing
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect();
    for alias in aliases {
        if !values.contains(alias) {
            values.push(alias.clone());
        }
    }
    values.join(",")
}

#[derive(Deserialize)]
struct TwTask {
    uuid: String,
    #[serde(default)]
    description: String,
    project: Option<String>,
    status: String,
    due: Option<String>,
    wait: Option<String>,
    start: Option<String>,
    modified: Option<String>,
    entry: Option<String>,
    recur: Option<String>,
    parent: Option<String>,
    swimlane: Option<String>,
    kbcat: Option<String>,
}

impl From<TwTask> for LocalTask {
    fn from(task: TwTask) -> Self {
        let modified = task
            .modified
            .as_deref()
            .or(task.entry.as_deref())
            .and_then(parse_taskwarrior)
            .unwrap_or_default();
        LocalTask {
            uuid: task.uuid,
            description: task.description,
            project: task.project,
            due: task.due.as_deref().and_then(parse_taskwarrior),
            active: task.start.is_some(),
            completed: task.status == "completed",
            deleted: task.status == "deleted",
            wait: task.wait.as_deref().and_then(parse_taskwarrior),
            recurring: task.status == "recurring" || task.recur.is_some() || task.parent.is_some(),
            swimlane: task.swimlane,
            category: task.kbcat,
            modified,
        }
    }
}

/// Writes the attributes of `update` into a raw exported task.
fn apply_update(task: &mut Map<String, Value>, update: &LocalUpdate) {
    task.insert("description".into(), json!(update.description));
    task.insert("project".into(), json!(update.project));
    if let Some(due) = update.due {
        task.insert("due".into(), json!(format_taskwarrior(due)));
    }
    match update.wait {
        WaitChange::Keep => {}
        WaitChange::Clear => {
            task.remove("wait");
            if task.get("status").and_then(Value::as_str) == Some("waiting") {
                task.insert("status".into(), json!("pending"));
            }
        }
        WaitChange::Until(until) => {
            task.insert("wait".into(), json!(format_taskwarrior(until)));
        }
    }
    if let Some(swimlane) = &update.swimlane {
        task.insert(SWIMLANE_UDA.into(), json!(swimlane));
    }
    if let Some(category) = &update.category {
        task.insert(CATEGORY_UDA.into(), json!(category));
    }
    task.remove("modified");
}

#[async_trait]
impl LocalStore for TaskwarriorClient {
    async fn list_tasks(&self, filter: &LocalFilter) -> Result<Vec<LocalTask>, ClientError> {
        let args = vec![
            format!("project:{}", filter.project),
            format!("modified.after:{}", format_taskwarrior(filter.modified_after)),
            "export".to_string(),
        ];
        let out = self.run(&args, None).await?;
        let tasks: Vec<TwTask> = serde_json::from_slice(&out)?;
        Ok(tasks.into_iter().map(LocalTask::from).collect())
    }

    async fn get_task(&self, uuid: &str) -> Result<LocalTask, ClientError> {
        let raw = self.export_raw(uuid).await?;
        let task: TwTask = serde_json::from_value(Value::Object(raw))?;
        Ok(task.into())
    }

    async fn create_task(&self, update: &LocalUpdate) -> Result<LocalTask, ClientError> {
        let uuid = uuid::Uuid::new_v4().to_string();
        let mut task = Map::new();
        task.insert("uuid".into(), json!(uuid));
        task.insert("status".into(), json!("pending"));
        task.insert("entry".into(), json!(format_taskwarrior(Utc::now())));
        apply_update(&mut task, update);
        self.import(&task).await?;
        self.get_task(&uuid).await
    }

    async fn save(&self, uuid: &str, update: &LocalUpdate) -> Result<(), ClientError> {
        let mut task = self.export_raw(uuid).await?;
        apply_update(&mut task, update);
        self.import(&task).await
    }

    async fn start(&self, uuid: &str) -> Result<(), ClientError> {
        self.command(uuid, "start").await
    }

    async fn stop(&self, uuid: &str) -> Result<(), ClientError> {
        self.command(uuid, "stop").await
    }

    async fn complete(&self, uuid: &str) -> Result<(), ClientError> {
        self.command(uuid, "done").await
    }

    async fn delete(&self, uuid: &str) -> Result<(), ClientError> {
        self.command(uuid, "delete").await
    }

    async fn sync_ledger(&self) -> Result<(), ClientError> {
        self.run(&["sync".into()], None).await?;
        Ok(())
    }
}
