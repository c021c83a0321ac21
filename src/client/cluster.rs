use std::collections::HashMap;
use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use crate::client::client::Client;
use crate::client::collection::Collection;
use crate::client::send;
use crate::common::error::Result;
use crate::common::utils::{join_path, require_non_empty};
use crate::connection::{Connection, Request};

/// Health state reported by the supervision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServerStatus {
    Good,
    Bad,
    Failed,
    Unclear,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerStatus::Good => "GOOD",
            ServerStatus::Bad => "BAD",
            ServerStatus::Failed => "FAILED",
            ServerStatus::Unclear => "UNCLEAR",
            ServerStatus::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Heartbeat timestamps are empty until the first heartbeat arrives
fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|t| t.with_timezone(&Utc)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerHealth {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_heartbeat_acked: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_heartbeat_sent: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_heartbeat_status: String,
    /// `Agent`, `Coordinator` or `DBServer`
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub short_name: String,
    pub status: ServerStatus,
    #[serde(default)]
    pub can_be_deleted: bool,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterHealth {
    #[serde(rename = "ClusterId")]
    pub id: String,
    #[serde(rename = "Health")]
    pub health: HashMap<String, ServerHealth>,
}

impl ClusterHealth {
    /// Servers whose status is not `GOOD`
    pub fn unhealthy(&self) -> impl Iterator<Item = (&String, &ServerHealth)> {
        self.health.iter().filter(|(_, h)| h.status != ServerStatus::Good)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryCollection {
    pub parameters: Value,
    #[serde(default)]
    pub indexes: Vec<Value>,
    #[serde(default, rename = "allInSync")]
    pub all_in_sync: bool,
}

impl InventoryCollection {
    pub fn name(&self) -> Option<&str> {
        self.parameters.get("name").and_then(Value::as_str)
    }
}

/// Collections and views of a database as seen by the cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryResponse {
    #[serde(default)]
    pub collections: Vec<InventoryCollection>,
    #[serde(default)]
    pub views: Vec<Value>,
    #[serde(default)]
    pub tick: String,
}

impl InventoryResponse {
    pub fn collection_by_name(&self, name: &str) -> Option<&InventoryCollection> {
        self.collections.iter().find(|c| c.name() == Some(name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberOfServers {
    #[serde(default)]
    pub number_of_coordinators: Option<u32>,
    #[serde(default, rename = "numberOfDBServers")]
    pub number_of_db_servers: Option<u32>,
    #[serde(default)]
    pub cleaned_servers: Vec<String>,
}

/// State of a supervision job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default)]
    pub id: String,
    /// `ToDo`, `Pending`, `Finished` or `Failed`
    pub status: String,
    #[serde(rename = "type", default)]
    pub job_type: String,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobId {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MoveShardRequest<'a> {
    database: &'a str,
    collection: &'a str,
    shard: &'a str,
    from_server: &'a str,
    to_server: &'a str,
}

/// Cluster administration; only available through a coordinator
#[derive(Clone)]
pub struct Cluster {
    client: Client,
}

impl Client {
    /// Cluster handle; fails with `Unsupported` unless connected to a coordinator
    pub async fn cluster(&self) -> Result<Cluster> {
        self.require_coordinator("cluster administration").await?;
        Ok(Cluster { client: self.clone() })
    }
}

impl Cluster {
    fn conn(&self) -> &dyn Connection {
        &**self.client.connection()
    }

    fn admin_path(&self, op: &str) -> String {
        join_path(&["_admin", "cluster", op])
    }

    pub async fn health(&self) -> Result<ClusterHealth> {
        let req = Request::get(self.admin_path("health"));
        send(self.conn(), req, &[200]).await?.parse_body()
    }

    /// Inventory of a database; requires the database to exist
    pub async fn database_inventory(&self, database: &str) -> Result<InventoryResponse> {
        let req = Request::get(crate::client::client::db_path(
            database,
            &["_api", "replication", "clusterInventory"],
        ));
        send(self.conn(), req, &[200]).await?.parse_body()
    }

    /// Start moving a shard; returns the supervision job id
    pub async fn move_shard(&self, collection: &Collection, shard: &str, from_server: &str, to_server: &str) -> Result<String> {
        require_non_empty(shard, "shard")?;
        require_non_empty(from_server, "source server")?;
        require_non_empty(to_server, "target server")?;
        let body = MoveShardRequest {
            database: collection.database().name(),
            collection: collection.name(),
            shard,
            from_server,
            to_server,
        };
        let req = Request::post(self.admin_path("moveShard")).with_json_body(&body)?;
        let job: JobId = send(self.conn(), req, &[202]).await?.parse_body()?;
        info!(shard = %shard, from = %from_server, to = %to_server, job = %job.id, "moving shard");
        Ok(job.id)
    }

    /// Move all shards off a DB-Server; returns the job id
    pub async fn clean_out_server(&self, server_id: &str) -> Result<String> {
        require_non_empty(server_id, "server id")?;
        let req = Request::post(self.admin_path("cleanOutServer"))
            .with_json_body(&serde_json::json!({ "server": server_id }))?;
        let job: JobId = send(self.conn(), req, &[200, 202]).await?.parse_body()?;
        info!(server = %server_id, job = %job.id, "cleaning out server");
        Ok(job.id)
    }

    /// Hand over shard leadership of a DB-Server; returns the job id
    pub async fn resign_server(&self, server_id: &str) -> Result<String> {
        require_non_empty(server_id, "server id")?;
        let req = Request::post(self.admin_path("resignLeadership"))
            .with_json_body(&serde_json::json!({ "server": server_id }))?;
        let job: JobId = send(self.conn(), req, &[200, 202]).await?.parse_body()?;
        Ok(job.id)
    }

    pub async fn number_of_servers(&self) -> Result<NumberOfServers> {
        let req = Request::get(self.admin_path("numberOfServers"));
        send(self.conn(), req, &[200]).await?.parse_body()
    }

    /// Whether a clean out of the server has finished
    pub async fn is_cleaned_out(&self, server_id: &str) -> Result<bool> {
        let servers = self.number_of_servers().await?;
        Ok(servers.cleaned_servers.iter().any(|s| s == server_id))
    }

    /// Remove a failed, non-responding server from the cluster
    pub async fn remove_server(&self, server_id: &str) -> Result<()> {
        require_non_empty(server_id, "server id")?;
        let req = Request::post(self.admin_path("removeServer")).with_json_body(server_id)?;
        send(self.conn(), req, &[200]).await?;
        Ok(())
    }

    /// Toggle supervision maintenance mode
    pub async fn set_maintenance_mode(&self, enabled: bool) -> Result<()> {
        let mode = if enabled { "on" } else { "off" };
        let req = Request::put(self.admin_path("maintenance")).with_json_body(mode)?;
        send(self.conn(), req, &[200]).await?;
        debug!(mode, "set cluster maintenance mode");
        Ok(())
    }

    pub async fn job_status(&self, job_id: &str) -> Result<JobStatus> {
        require_non_empty(job_id, "job id")?;
        let req = Request::get(self.admin_path("queryAgencyJob")).with_query("id", job_id);
        send(self.conn(), req, &[200]).await?.parse_body()
    }
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster").finish_non_exhaustive()
    }
}
