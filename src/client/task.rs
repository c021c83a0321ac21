use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::client::database::Database;
use crate::client::send;
use crate::common::error::{ArangoError, Result};
use crate::common::utils::{path_escape, require_non_empty, timestamp_from_secs};
use crate::connection::Request;

/// A server-side JavaScript task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `periodic` or `timed`
    #[serde(rename = "type", default)]
    pub task_type: String,
    /// Seconds between runs, 0 for one-shot tasks
    #[serde(default)]
    pub period: f64,
    /// Creation time as seconds since the epoch
    #[serde(default)]
    pub created: f64,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub offset: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskOptions {
    /// Explicit id; the server picks one when absent
    #[serde(skip)]
    pub id: Option<String>,
    pub name: String,
    /// JavaScript function body run with `params`
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<f64>,
    /// Delay before the first run in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

impl TaskOptions {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        TaskOptions {
            name: name.into(),
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_period(mut self, secs: f64) -> Self {
        self.period = Some(secs);
        self
    }

    pub fn with_offset(mut self, secs: f64) -> Self {
        self.offset = Some(secs);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    db: Database,
    info: TaskInfo,
}

impl Task {
    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &TaskInfo {
        &self.info
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        timestamp_from_secs(self.info.created)
    }

    pub async fn remove(&self) -> Result<()> {
        let escaped = path_escape(&self.info.id);
        let req = Request::delete(self.db.path(&["_api", "tasks", &escaped]));
        send(self.db.conn(), req, &[200]).await?;
        Ok(())
    }
}

impl Database {
    pub async fn tasks(&self) -> Result<Vec<Task>> {
        let req = Request::get(self.path(&["_api", "tasks"]));
        let infos: Vec<TaskInfo> = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(infos.into_iter().map(|info| Task { db: self.clone(), info }).collect())
    }

    pub async fn task(&self, id: &str) -> Result<Task> {
        require_non_empty(id, "task id")?;
        let escaped = path_escape(id);
        let req = Request::get(self.path(&["_api", "tasks", &escaped]));
        let info = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(Task { db: self.clone(), info })
    }

    /// Register a task, under `options.id` when given
    pub async fn create_task(&self, options: &TaskOptions) -> Result<Task> {
        if options.command.trim().is_empty() {
            return Err(ArangoError::invalid_argument("task command cannot be empty"));
        }
        let req = match &options.id {
            Some(id) => {
                require_non_empty(id, "task id")?;
                let escaped = path_escape(id);
                Request::put(self.path(&["_api", "tasks", &escaped]))
            }
            None => Request::post(self.path(&["_api", "tasks"])),
        }
        .with_json_body(options)?;
        let info = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(Task { db: self.clone(), info })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::connection::mock::{error_response, MockConnection};
    use crate::connection::HttpMethod;

    fn task_body(id: &str) -> Value {
        json!({"id": id, "name": "cleanup", "type": "periodic", "period": 60,
            "created": 1700000000.5, "command": "(function (p) {})(params)", "database": "app", "offset": 0})
    }

    #[tokio::test]
    async fn test_create_task_with_and_without_id() {
        let conn = MockConnection::new();
        conn.push_json(200, task_body("42"));
        conn.push_json(200, task_body("mine"));
        let db = Database::new(conn.clone(), "app");

        let options = TaskOptions::new("cleanup", "require('console').log(params.x)")
            .with_params(json!({"x": 1}))
            .with_period(60.0);
        let task = db.create_task(&options).await.unwrap();
        assert_eq!(task.id(), "42");
        assert_eq!(task.created_at().unwrap().timestamp(), 1_700_000_000);
        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::POST);
        assert_eq!(req.path, "/_db/app/_api/tasks");
        let body = req.body_json().unwrap();
        assert_eq!(body["period"], 60.0);
        assert!(body.get("id").is_none());

        db.create_task(&options.clone().with_id("mine")).await.unwrap();
        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::PUT);
        assert_eq!(req.path, "/_db/app/_api/tasks/mine");

        let empty = TaskOptions::new("noop", "");
        assert!(db.create_task(&empty).await.unwrap_err().is_invalid_argument());
    }

    #[tokio::test]
    async fn test_list_get_remove() {
        let conn = MockConnection::new();
        conn.push_json(200, json!([task_body("1"), task_body("2")]));
        conn.push_json(200, task_body("2"));
        conn.push_json(200, json!({"error": false, "code": 200}));
        conn.push(error_response(404, 1852, "task not found"));
        let db = Database::new(conn.clone(), "app");

        assert_eq!(db.tasks().await.unwrap().len(), 2);
        let task = db.task("2").await.unwrap();
        task.remove().await.unwrap();
        assert_eq!(conn.last_request().method, HttpMethod::DELETE);
        assert!(db.task("2").await.unwrap_err().is_not_found());
    }
}
