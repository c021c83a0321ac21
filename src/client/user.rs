use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use crate::client::client::Client;
use crate::client::send;
use crate::common::error::Result;
use crate::common::utils::{path_escape, require_non_empty};
use crate::connection::Request;

/// Access level on a database or collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grant {
    #[serde(rename = "rw")]
    ReadWrite,
    #[serde(rename = "ro")]
    ReadOnly,
    #[serde(rename = "none")]
    None,
    /// No explicit grant; the database level one applies
    #[serde(rename = "undefined")]
    Undefined,
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Grant::ReadWrite => "rw",
            Grant::ReadOnly => "ro",
            Grant::None => "none",
            Grant::Undefined => "undefined",
        };
        f.write_str(name)
    }
}

/// Attributes of a user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub extra: Value,
    #[serde(default)]
    pub change_password: bool,
}

/// Fields sent on create, update and replace
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOptions {
    #[serde(rename = "passwd", skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl UserOptions {
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

#[derive(Debug, Serialize)]
struct CreateUserRequest<'a> {
    user: &'a str,
    #[serde(flatten)]
    options: &'a UserOptions,
}

#[derive(Debug, Deserialize)]
struct UserList {
    result: Vec<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct GrantResult {
    result: Grant,
}

#[derive(Debug, Deserialize)]
struct DatabaseGrants {
    result: HashMap<String, Grant>,
}

/// Handle to a user account, managed through `_system`
#[derive(Clone)]
pub struct User {
    client: Client,
    info: UserInfo,
}

impl Client {
    fn user_path(&self, name: &str, parts: &[&str]) -> String {
        let escaped = path_escape(name);
        let mut all = vec!["_api", "user", escaped.as_str()];
        all.extend_from_slice(parts);
        self.system_path(&all)
    }

    pub async fn users(&self) -> Result<Vec<User>> {
        let req = Request::get(self.system_path(&["_api", "user"]));
        let list: UserList = send(&**self.connection(), req, &[200]).await?.parse_body()?;
        Ok(list
            .result
            .into_iter()
            .map(|info| User { client: self.clone(), info })
            .collect())
    }

    pub async fn user(&self, name: &str) -> Result<User> {
        require_non_empty(name, "user name")?;
        let req = Request::get(self.user_path(name, &[]));
        let info = send(&**self.connection(), req, &[200]).await?.parse_body()?;
        Ok(User { client: self.clone(), info })
    }

    pub async fn user_exists(&self, name: &str) -> Result<bool> {
        match self.user(name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn create_user(&self, name: &str, options: &UserOptions) -> Result<User> {
        require_non_empty(name, "user name")?;
        let body = CreateUserRequest { user: name, options };
        let req = Request::post(self.system_path(&["_api", "user"])).with_json_body(&body)?;
        let info = send(&**self.connection(), req, &[201]).await?.parse_body()?;
        debug!(user = %name, "created user");
        Ok(User { client: self.clone(), info })
    }
}

impl User {
    pub fn name(&self) -> &str {
        &self.info.user
    }

    pub fn is_active(&self) -> bool {
        self.info.active
    }

    pub fn extra(&self) -> &Value {
        &self.info.extra
    }

    pub fn info(&self) -> &UserInfo {
        &self.info
    }

    fn path(&self, parts: &[&str]) -> String {
        self.client.user_path(&self.info.user, parts)
    }

    fn conn(&self) -> &dyn crate::connection::Connection {
        &**self.client.connection()
    }

    /// Change only the given fields
    pub async fn update(&mut self, options: &UserOptions) -> Result<()> {
        let req = Request::patch(self.path(&[])).with_json_body(options)?;
        self.info = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(())
    }

    /// Replace all fields; unset ones fall back to server defaults
    pub async fn replace(&mut self, options: &UserOptions) -> Result<()> {
        let req = Request::put(self.path(&[])).with_json_body(options)?;
        self.info = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(())
    }

    pub async fn remove(&self) -> Result<()> {
        let req = Request::delete(self.path(&[]));
        send(self.conn(), req, &[202]).await?;
        Ok(())
    }

    /// Databases the user can access, with the effective grant
    pub async fn accessible_databases(&self) -> Result<HashMap<String, Grant>> {
        let req = Request::get(self.path(&["database"]));
        let grants: DatabaseGrants = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(grants.result)
    }

    pub async fn set_database_access(&self, database: &str, grant: Grant) -> Result<()> {
        let db = path_escape(database);
        let req = Request::put(self.path(&["database", &db]))
            .with_json_body(&serde_json::json!({ "grant": grant }))?;
        send(self.conn(), req, &[200]).await?;
        Ok(())
    }

    pub async fn database_access(&self, database: &str) -> Result<Grant> {
        let db = path_escape(database);
        let req = Request::get(self.path(&["database", &db]));
        let grant: GrantResult = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(grant.result)
    }

    pub async fn remove_database_access(&self, database: &str) -> Result<()> {
        let db = path_escape(database);
        let req = Request::delete(self.path(&["database", &db]));
        send(self.conn(), req, &[202]).await?;
        Ok(())
    }

    pub async fn set_collection_access(&self, database: &str, collection: &str, grant: Grant) -> Result<()> {
        let db = path_escape(database);
        let col = path_escape(collection);
        let req = Request::put(self.path(&["database", &db, &col]))
            .with_json_body(&serde_json::json!({ "grant": grant }))?;
        send(self.conn(), req, &[200]).await?;
        Ok(())
    }

    pub async fn collection_access(&self, database: &str, collection: &str) -> Result<Grant> {
        let db = path_escape(database);
        let col = path_escape(collection);
        let req = Request::get(self.path(&["database", &db, &col]));
        let grant: GrantResult = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(grant.result)
    }

    pub async fn remove_collection_access(&self, database: &str, collection: &str) -> Result<()> {
        let db = path_escape(database);
        let col = path_escape(collection);
        let req = Request::delete(self.path(&["database", &db, &col]));
        send(self.conn(), req, &[202]).await?;
        Ok(())
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User").field("info", &self.info).finish()
    }
}
