use std::collections::HashMap;
use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::client::client::Client;
use crate::client::send;
use crate::common::error::{ArangoError, Result};
use crate::common::utils::{join_path, timestamp_from_secs};
use crate::connection::{Connection, Request};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    Default,
    /// Writes are rejected
    Readonly,
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMode::Default => f.write_str("default"),
            ServerMode::Readonly => f.write_str("readonly"),
        }
    }
}

/// Log level per topic, e.g. `{"queries": "INFO"}`
pub type LogLevels = HashMap<String, String>;

#[derive(Debug, Serialize, Deserialize)]
struct ModeBody {
    mode: ServerMode,
}

#[derive(Debug, Deserialize)]
struct TimeResponse {
    time: f64,
}

impl Client {
    pub async fn server_mode(&self) -> Result<ServerMode> {
        let req = Request::get(join_path(&["_admin", "server", "mode"]));
        let body: ModeBody = send(&**self.connection(), req, &[200]).await?.parse_body()?;
        Ok(body.mode)
    }

    pub async fn set_server_mode(&self, mode: ServerMode) -> Result<()> {
        let req = Request::put(join_path(&["_admin", "server", "mode"])).with_json_body(&ModeBody { mode })?;
        send(&**self.connection(), req, &[200]).await?;
        debug!(%mode, "changed server mode");
        Ok(())
    }

    pub async fn log_levels(&self) -> Result<LogLevels> {
        let req = Request::get(join_path(&["_admin", "log", "level"]));
        send(&**self.connection(), req, &[200]).await?.parse_body()
    }

    /// Change the given topics; returns the levels of all topics
    pub async fn set_log_levels(&self, levels: &LogLevels) -> Result<LogLevels> {
        let req = Request::put(join_path(&["_admin", "log", "level"])).with_json_body(levels)?;
        send(&**self.connection(), req, &[200]).await?.parse_body()
    }

    /// Whether the server accepts requests. A 503 (starting up, shutting
    /// down, or a follower in active failover) is reported as `false`.
    pub async fn check_availability(&self) -> Result<bool> {
        let req = Request::get(join_path(&["_admin", "server", "availability"]));
        let resp = self.connection().execute(req).await?;
        match resp.status_code {
            200 => Ok(true),
            503 => Ok(false),
            _ => Err(resp.as_error()),
        }
    }

    pub async fn server_time(&self) -> Result<DateTime<Utc>> {
        let req = Request::get(join_path(&["_admin", "time"]));
        let body: TimeResponse = send(&**self.connection(), req, &[200]).await?.parse_body()?;
        timestamp_from_secs(body.time)
            .ok_or_else(|| ArangoError::invalid_argument(format!("server time {} out of range", body.time)))
    }

    /// Ask the server to shut down
    pub async fn shutdown(&self, remove_from_cluster: bool) -> Result<()> {
        let mut req = Request::delete(join_path(&["_admin", "shutdown"]));
        if remove_from_cluster {
            req.set_query("remove_from_cluster", 1);
        }
        send(&**self.connection(), req, &[200]).await?;
        warn!(remove_from_cluster, "server shutdown requested");
        Ok(())
    }
}
