//! Access to the agency, the key/value store that cluster agents keep in
//! consensus. Requests go to the agent endpoints; redirects to the leader
//! are followed by the HTTP layer.

pub mod lock;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;
use crate::client::send;
use crate::common::error::{ArangoError, Result};
use crate::common::utils::join_path;
use crate::connection::{Connection, Request};

pub use lock::Lock;

/// Render key parts as an agency path: `["arango", "Plan"]` -> `/arango/Plan`
pub fn key_path(key: &[&str]) -> String {
    let mut path = String::new();
    for part in key {
        path.push('/');
        path.push_str(part.trim_matches('/'));
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

fn require_key(key: &[&str]) -> Result<()> {
    if key.is_empty() || key.iter().any(|part| part.trim_matches('/').is_empty()) {
        return Err(ArangoError::invalid_argument("agency key cannot be empty"));
    }
    Ok(())
}

/// A single agency write transaction: operations applied atomically when
/// every precondition holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    operations: Map<String, Value>,
    conditions: Map<String, Value>,
    client_id: Option<String>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, expiring after `ttl` when given
    pub fn set<V: Serialize + ?Sized>(mut self, key: &[&str], value: &V, ttl: Option<Duration>) -> Result<Self> {
        require_key(key)?;
        let mut op = Map::new();
        op.insert("op".to_string(), Value::from("set"));
        op.insert("new".to_string(), serde_json::to_value(value)?);
        if let Some(ttl) = ttl {
            op.insert("ttl".to_string(), Value::from(ttl.as_secs()));
        }
        self.operations.insert(key_path(key), Value::Object(op));
        Ok(self)
    }

    pub fn delete(mut self, key: &[&str]) -> Result<Self> {
        require_key(key)?;
        self.operations.insert(key_path(key), serde_json::json!({ "op": "delete" }));
        Ok(self)
    }

    /// Require `key` to be absent
    pub fn if_empty(mut self, key: &[&str]) -> Result<Self> {
        require_key(key)?;
        self.conditions.insert(key_path(key), serde_json::json!({ "oldEmpty": true }));
        Ok(self)
    }

    /// Require `key` to hold exactly `value`
    pub fn if_equal_to<V: Serialize + ?Sized>(mut self, key: &[&str], value: &V) -> Result<Self> {
        require_key(key)?;
        let old = serde_json::to_value(value)?;
        self.conditions.insert(key_path(key), serde_json::json!({ "old": old }));
        Ok(self)
    }

    /// Tag the transaction so its effect can be looked up later
    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    fn to_body(&self) -> Value {
        let mut entry = vec![
            Value::Object(self.operations.clone()),
            Value::Object(self.conditions.clone()),
        ];
        if let Some(id) = &self.client_id {
            entry.push(Value::String(id.clone()));
        }
        Value::Array(vec![Value::Array(entry)])
    }
}

#[derive(Debug, serde::Deserialize)]
struct WriteResult {
    #[serde(default)]
    results: Vec<u64>,
}

/// Agency API over a connection to the agents
#[derive(Clone)]
pub struct Agency {
    conn: Arc<dyn Connection>,
}

impl Agency {
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Agency { conn }
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// Read the value stored under `key`
    pub async fn read_key<T: DeserializeOwned>(&self, key: &[&str]) -> Result<T> {
        require_key(key)?;
        let path = key_path(key);
        let body = serde_json::json!([[path]]);
        let req = Request::post(join_path(&["_api", "agency", "read"])).with_json_body(&body)?;
        let mut results: Vec<Value> = send(&*self.conn, req, &[200]).await?.parse_body()?;

        let mut current = results.pop().unwrap_or(Value::Null);
        for part in key {
            current = match current {
                Value::Object(mut obj) => obj
                    .remove(part.trim_matches('/'))
                    .ok_or_else(|| ArangoError::KeyNotFound { key: path.clone() })?,
                _ => return Err(ArangoError::KeyNotFound { key: path }),
            };
        }
        Ok(serde_json::from_value(current)?)
    }

    /// Apply a write transaction. A failed precondition is reported as
    /// HTTP 412.
    pub async fn write_transaction(&self, transaction: &Transaction) -> Result<()> {
        if transaction.is_empty() {
            return Err(ArangoError::invalid_argument("agency transaction has no operations"));
        }
        let req = Request::post(join_path(&["_api", "agency", "write"])).with_json_body(&transaction.to_body())?;
        let result: WriteResult = send(&*self.conn, req, &[200]).await?.parse_body()?;
        if result.results.iter().any(|&index| index == 0) {
            return Err(ArangoError::response(412, 0, "agency precondition failed"));
        }
        debug!(keys = transaction.operations.len(), "agency write applied");
        Ok(())
    }

    pub async fn write_key<V: Serialize + ?Sized>(&self, key: &[&str], value: &V, ttl: Option<Duration>) -> Result<()> {
        self.write_transaction(&Transaction::new().set(key, value, ttl)?).await
    }

    /// Set `key` only when it does not exist yet
    pub async fn write_key_if_empty<V: Serialize + ?Sized>(&self, key: &[&str], value: &V, ttl: Option<Duration>) -> Result<()> {
        let transaction = Transaction::new().set(key, value, ttl)?.if_empty(key)?;
        self.write_transaction(&transaction).await
    }

    /// Set `key` to `new` only when it currently holds `old`
    pub async fn write_key_if_equal_to<N, O>(&self, key: &[&str], new: &N, old: &O, ttl: Option<Duration>) -> Result<()>
    where
        N: Serialize + ?Sized,
        O: Serialize + ?Sized,
    {
        let transaction = Transaction::new().set(key, new, ttl)?.if_equal_to(key, old)?;
        self.write_transaction(&transaction).await
    }

    pub async fn remove_key(&self, key: &[&str]) -> Result<()> {
        self.write_transaction(&Transaction::new().delete(key)?).await
    }

    /// Delete `key` only when it currently holds `old`
    pub async fn remove_key_if_equal_to<O: Serialize + ?Sized>(&self, key: &[&str], old: &O) -> Result<()> {
        let transaction = Transaction::new().delete(key)?.if_equal_to(key, old)?;
        self.write_transaction(&transaction).await
    }
}

impl fmt::Debug for Agency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agency")
            .field("endpoints", &self.conn.endpoints())
            .finish()
    }
}
