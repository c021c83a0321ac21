use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use crate::client::client::Client;
use crate::client::database::Database;
use crate::client::send;
use crate::common::error::{ArangoError, Result};
use crate::common::utils::{duration_secs, path_escape};
use crate::connection::Request;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerStatus {
    pub running: bool,
    pub last_log_tick: String,
    pub last_uncommitted_log_tick: String,
    pub total_events: u64,
    pub time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerServer {
    pub version: String,
    pub server_id: String,
    pub engine: String,
}

/// Response of `GET /_api/replication/logger-state`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerState {
    pub state: LoggerStatus,
    #[serde(default)]
    pub server: LoggerServer,
    #[serde(default)]
    pub clients: Vec<Value>,
}

/// Response of `GET /_api/replication/inventory`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationInventory {
    #[serde(default)]
    pub collections: Vec<Value>,
    #[serde(default)]
    pub views: Vec<Value>,
    #[serde(default)]
    pub state: LoggerStatus,
    #[serde(default)]
    pub tick: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchResponse {
    id: String,
    #[serde(default)]
    last_tick: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirstTick {
    first_tick: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerIdResponse {
    server_id: String,
}

/// Dump batch keeping WAL files alive while a client syncs
pub struct Batch {
    db: Database,
    id: String,
    last_tick: Option<String>,
    db_server_id: Option<String>,
}

impl Batch {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tick at batch creation, absent on older servers
    pub fn last_tick(&self) -> Option<&str> {
        self.last_tick.as_deref()
    }

    fn request(&self, req: Request) -> Request {
        match &self.db_server_id {
            Some(id) => req.with_query("DBserver", id),
            None => req,
        }
    }

    /// Extend the batch lifetime
    pub async fn extend(&self, ttl: Duration) -> Result<()> {
        let escaped = path_escape(&self.id);
        let req = self
            .request(Request::put(self.db.path(&["_api", "replication", "batch", &escaped])))
            .with_json_body(&serde_json::json!({ "ttl": duration_secs(ttl) }))?;
        send(self.db.conn(), req, &[200, 204]).await?;
        Ok(())
    }

    pub async fn delete(&self) -> Result<()> {
        let escaped = path_escape(&self.id);
        let req = self.request(Request::delete(self.db.path(&["_api", "replication", "batch", &escaped])));
        send(self.db.conn(), req, &[200, 204]).await?;
        debug!(batch = %self.id, "deleted replication batch");
        Ok(())
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("database", &self.db.name())
            .field("id", &self.id)
            .field("last_tick", &self.last_tick)
            .finish()
    }
}

/// Replication API of a server
#[derive(Clone)]
pub struct Replication {
    client: Client,
}

impl Client {
    pub fn replication(&self) -> Replication {
        Replication { client: self.clone() }
    }
}

impl Replication {
    fn path(&self, database: &str, op: &str) -> String {
        crate::client::client::db_path(database, &["_api", "replication", op])
    }

    /// Create a dump batch, on a specific DB-Server when `db_server_id` is set
    pub async fn create_batch(&self, database: &str, db_server_id: Option<&str>, ttl: Duration) -> Result<Batch> {
        if ttl.is_zero() {
            return Err(ArangoError::invalid_argument("batch ttl must be positive"));
        }
        let mut req = Request::post(self.path(database, "batch"))
            .with_json_body(&serde_json::json!({ "ttl": duration_secs(ttl) }))?;
        if let Some(id) = db_server_id {
            req.set_query("DBserver", id);
        }
        let resp: BatchResponse = send(&**self.client.connection(), req, &[200]).await?.parse_body()?;
        debug!(database, batch = %resp.id, "created replication batch");
        Ok(Batch {
            db: self.client.database_unchecked(database),
            id: resp.id,
            last_tick: resp.last_tick,
            db_server_id: db_server_id.map(str::to_string),
        })
    }

    pub async fn inventory(&self, database: &str, batch_id: &str, include_system: bool) -> Result<ReplicationInventory> {
        let req = Request::get(self.path(database, "inventory"))
            .with_query("batchId", batch_id)
            .with_query("includeSystem", include_system);
        send(&**self.client.connection(), req, &[200]).await?.parse_body()
    }

    pub async fn logger_state(&self, database: &str) -> Result<LoggerState> {
        let req = Request::get(self.path(database, "logger-state"));
        send(&**self.client.connection(), req, &[200]).await?.parse_body()
    }

    /// Oldest tick still available in the WAL
    pub async fn logger_first_tick(&self, database: &str) -> Result<String> {
        let req = Request::get(self.path(database, "logger-first-tick"));
        let tick: FirstTick = send(&**self.client.connection(), req, &[200]).await?.parse_body()?;
        Ok(tick.first_tick)
    }

    pub async fn server_id(&self, database: &str) -> Result<String> {
        let req = Request::get(self.path(database, "server-id"));
        let resp: ServerIdResponse = send(&**self.client.connection(), req, &[200]).await?.parse_body()?;
        Ok(resp.server_id)
    }
}

impl fmt::Debug for Replication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replication").finish_non_exhaustive()
    }
}
