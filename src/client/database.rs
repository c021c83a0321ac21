use std::sync::Arc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::client::client::db_path;
use crate::client::collection::ReplicationFactor;
use crate::client::send;
use crate::common::error::Result;
use crate::common::utils::{path_escape, SYSTEM_DATABASE};
use crate::connection::{Connection, Request};

/// Handle to a database
#[derive(Clone)]
pub struct Database {
    conn: Arc<dyn Connection>,
    name: String,
}

/// Response of `GET /_api/database/current`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub is_system: bool,
    /// Cluster only: "", "flexible" or "single"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<ReplicationFactor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_concern: Option<u32>,
}

/// Storage engine description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineInfo {
    /// `rocksdb` on all current servers
    pub name: String,
    #[serde(default)]
    pub supports: Value,
}

/// Database defaults applied to new collections (cluster only)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<ReplicationFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_concern: Option<u32>,
}

/// User created together with a database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseUser {
    #[serde(rename = "username")]
    pub user_name: String,
    #[serde(rename = "passwd", skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateDatabaseOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<DatabaseUser>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<DatabaseOptions>,
}

impl CreateDatabaseOptions {
    pub fn with_user(mut self, user: DatabaseUser) -> Self {
        self.users.get_or_insert_with(Vec::new).push(user);
        self
    }

    pub fn with_sharding(mut self, sharding: impl Into<String>) -> Self {
        self.options.get_or_insert_with(Default::default).sharding = Some(sharding.into());
        self
    }

    pub fn with_replication_factor(mut self, factor: ReplicationFactor) -> Self {
        self.options.get_or_insert_with(Default::default).replication_factor = Some(factor);
        self
    }

    pub fn with_write_concern(mut self, write_concern: u32) -> Self {
        self.options.get_or_insert_with(Default::default).write_concern = Some(write_concern);
        self
    }
}

impl Database {
    pub(crate) fn new(conn: Arc<dyn Connection>, name: &str) -> Self {
        Database {
            conn,
            name: name.to_string(),
        }
    }

    /// Database name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if this is the system database
    pub fn is_system(&self) -> bool {
        self.name == SYSTEM_DATABASE
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// Escaped request path inside this database
    pub(crate) fn path(&self, parts: &[&str]) -> String {
        db_path(&self.name, parts)
    }

    pub(crate) fn conn(&self) -> &dyn Connection {
        &*self.conn
    }

    pub async fn info(&self) -> Result<DatabaseInfo> {
        let req = Request::get(self.path(&["_api", "database", "current"]));
        send(self.conn(), req, &[200]).await?.parse_field("result")
    }

    pub async fn engine_info(&self) -> Result<EngineInfo> {
        let req = Request::get(self.path(&["_api", "engine"]));
        send(self.conn(), req, &[200]).await?.parse_body()
    }

    /// Drop the database. Must not be called on `_system`.
    pub async fn remove(&self) -> Result<()> {
        let name = path_escape(&self.name);
        let req = Request::delete(db_path(SYSTEM_DATABASE, &["_api", "database", &name]));
        send(self.conn(), req, &[200]).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::connection::mock::MockConnection;
    use crate::connection::HttpMethod;

    #[tokio::test]
    async fn test_info() {
        let conn = MockConnection::new();
        conn.push_json(200, json!({"error": false, "code": 200, "result": {
            "name": "shop", "id": "123", "path": "", "isSystem": false,
            "sharding": "", "replicationFactor": 2, "writeConcern": 1
        }}));
        let db = Database::new(conn.clone(), "shop");
        let info = db.info().await.unwrap();
        assert_eq!(info.id, "123");
        assert_eq!(info.replication_factor, Some(ReplicationFactor::Factor(2)));
        assert!(!db.is_system());
    }

    #[tokio::test]
    async fn test_remove() {
        let conn = MockConnection::new();
        conn.push_json(200, json!({"error": false, "code": 200, "result": true}));
        Database::new(conn.clone(), "my db").remove().await.unwrap();
        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::DELETE);
        assert_eq!(req.path, "/_db/_system/_api/database/my%20db");
    }

    #[test]
    fn test_create_options_serialization() {
        let options = CreateDatabaseOptions::default()
            .with_sharding("single")
            .with_replication_factor(ReplicationFactor::Satellite)
            .with_user(DatabaseUser {
                user_name: "admin".into(),
                password: Some("pw".into()),
                active: None,
                extra: None,
            });
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["options"]["replicationFactor"], "satellite");
        assert_eq!(json["options"]["sharding"], "single");
        assert_eq!(json["users"][0]["username"], "admin");
        assert_eq!(json["users"][0]["passwd"], "pw");
        assert!(json["options"].get("writeConcern").is_none());
    }
}
