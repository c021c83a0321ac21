use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::client::database::{CreateDatabaseOptions, Database};
use crate::client::send;
use crate::common::error::{ArangoError, Result};
use crate::common::utils::{database_path, join_path, path_escape, validate_database_name, SYSTEM_DATABASE};
use crate::common::version::VersionInfo;
use crate::connection::{Connection, Request};

/// Role of the server the client is talking to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRole {
    Single,
    Agent,
    Coordinator,
    DBServer,
    Undefined,
}

impl ServerRole {
    pub fn from_role(role: &str) -> Self {
        match role {
            "SINGLE" => ServerRole::Single,
            "AGENT" => ServerRole::Agent,
            "COORDINATOR" => ServerRole::Coordinator,
            "PRIMARY" => ServerRole::DBServer,
            _ => ServerRole::Undefined,
        }
    }
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerRole::Single => write!(f, "single"),
            ServerRole::Agent => write!(f, "agent"),
            ServerRole::Coordinator => write!(f, "coordinator"),
            ServerRole::DBServer => write!(f, "dbserver"),
            ServerRole::Undefined => write!(f, "undefined"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RoleResponse {
    role: String,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct EndpointList {
    endpoints: Vec<EndpointEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EndpointEntry {
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct CreateDatabaseRequest<'a> {
    name: &'a str,
    #[serde(flatten)]
    options: Option<&'a CreateDatabaseOptions>,
}

/// Entry point of the API. Cheap to clone; all clones share the connection.
#[derive(Clone)]
pub struct Client {
    conn: Arc<dyn Connection>,
}

impl Client {
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Client { conn }
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// Server version without details
    pub async fn version(&self) -> Result<VersionInfo> {
        let req = Request::get(join_path(&["_api", "version"]));
        send(&*self.conn, req, &[200]).await?.parse_body()
    }

    /// Server version including build details
    pub async fn version_with_details(&self) -> Result<VersionInfo> {
        let req = Request::get(join_path(&["_api", "version"])).with_query("details", true);
        send(&*self.conn, req, &[200]).await?.parse_body()
    }

    pub async fn server_role(&self) -> Result<ServerRole> {
        let req = Request::get(join_path(&["_admin", "server", "role"]));
        let role: RoleResponse = send(&*self.conn, req, &[200]).await?.parse_body()?;
        Ok(ServerRole::from_role(&role.role))
    }

    /// Id of the server in a cluster
    pub async fn server_id(&self) -> Result<String> {
        let req = Request::get(join_path(&["_admin", "server", "id"]));
        let id: IdResponse = send(&*self.conn, req, &[200]).await?.parse_body()?;
        Ok(id.id)
    }

    /// Fetch the coordinator endpoints of the cluster and hand them to the
    /// connection.
    pub async fn synchronize_endpoints(&self) -> Result<Vec<String>> {
        let req = Request::get(join_path(&["_api", "cluster", "endpoints"]));
        let list: EndpointList = send(&*self.conn, req, &[200]).await?.parse_body()?;
        let endpoints: Vec<String> = list.endpoints.into_iter().map(|e| e.endpoint).collect();
        if endpoints.is_empty() {
            return Ok(self.conn.endpoints());
        }
        debug!(count = endpoints.len(), "updating endpoints from cluster");
        self.conn.update_endpoints(&endpoints)?;
        Ok(endpoints)
    }

    /// Handle to an existing database
    pub async fn database(&self, name: &str) -> Result<Database> {
        validate_database_name(name)?;
        let req = Request::get(format!("{}/_api/database/current", database_path(name)));
        send(&*self.conn, req, &[200]).await?;
        Ok(Database::new(self.conn.clone(), name))
    }

    /// Handle to a database without checking that it exists
    pub fn database_unchecked(&self, name: &str) -> Database {
        Database::new(self.conn.clone(), name)
    }

    pub async fn database_exists(&self, name: &str) -> Result<bool> {
        match self.database(name).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn database_list(&self, path: &str) -> Result<Vec<Database>> {
        let req = Request::get(format!("{}/{}", database_path(SYSTEM_DATABASE), path));
        let names: Vec<String> = send(&*self.conn, req, &[200]).await?.parse_field("result")?;
        Ok(names.into_iter().map(|name| Database::new(self.conn.clone(), &name)).collect())
    }

    /// All databases; requires access to `_system`
    pub async fn databases(&self) -> Result<Vec<Database>> {
        self.database_list("_api/database").await
    }

    /// Databases the current user can access
    pub async fn accessible_databases(&self) -> Result<Vec<Database>> {
        self.database_list("_api/database/user").await
    }

    pub async fn create_database(&self, name: &str, options: Option<&CreateDatabaseOptions>) -> Result<Database> {
        validate_database_name(name)?;
        let body = CreateDatabaseRequest { name, options };
        let req = Request::post(format!("{}/_api/database", database_path(SYSTEM_DATABASE)))
            .with_json_body(&body)?;
        send(&*self.conn, req, &[201]).await?;
        Ok(Database::new(self.conn.clone(), name))
    }

    /// Fails with `Unsupported` unless the server is a coordinator
    pub(crate) async fn require_coordinator(&self, what: &str) -> Result<()> {
        match self.server_role().await? {
            ServerRole::Coordinator => Ok(()),
            role => Err(ArangoError::Unsupported(
                format!("{} requires a coordinator, server role is {}", what, role)
            )),
        }
    }

    pub(crate) fn system_path(&self, parts: &[&str]) -> String {
        format!("{}{}", database_path(SYSTEM_DATABASE), join_path(parts))
    }
}

/// Shorthand for an escaped `/_db/<db>/...` path
pub(crate) fn db_path(database: &str, parts: &[&str]) -> String {
    format!("/_db/{}{}", path_escape(database), join_path(parts))
}
