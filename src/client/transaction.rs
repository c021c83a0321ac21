use std::fmt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use crate::client::database::Database;
use crate::client::send;
use crate::common::error::{ArangoError, Result};
use crate::common::utils::path_escape;
use crate::connection::{Request, RequestOptions};

/// Identifier of a running stream transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        TransactionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Request options that route a call through this transaction
    pub fn options(&self) -> RequestOptions {
        RequestOptions::new().with_transaction_id(self.0.clone())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collections a transaction declares up front
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionCollections {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusive: Vec<String>,
}

impl TransactionCollections {
    pub fn read<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.read.extend(names.iter().map(|n| n.as_ref().to_string()));
        self
    }

    pub fn write<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.write.extend(names.iter().map(|n| n.as_ref().to_string()));
        self
    }

    pub fn exclusive<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.exclusive.extend(names.iter().map(|n| n.as_ref().to_string()));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginTransactionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_sync: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_implicit: Option<bool>,
    /// Seconds to wait for collection locks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_timeout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_transaction_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_fast_lock_round: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsTransactionOptions {
    pub collections: TransactionCollections,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_sync: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_implicit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_timeout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_transaction_size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Running,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub id: TransactionId,
    #[serde(alias = "state")]
    pub status: TransactionState,
}

#[derive(Debug, Serialize)]
struct BeginRequest<'a> {
    collections: &'a TransactionCollections,
    #[serde(flatten)]
    options: &'a BeginTransactionOptions,
}

#[derive(Debug, Serialize)]
struct JsRequest<'a> {
    action: &'a str,
    #[serde(flatten)]
    options: &'a JsTransactionOptions,
}

#[derive(Debug, Deserialize)]
struct TransactionList {
    transactions: Vec<TransactionStatus>,
}

impl Database {
    fn transaction_path(&self, id: &TransactionId) -> String {
        let escaped = path_escape(id.as_str());
        self.path(&["_api", "transaction", &escaped])
    }

    /// Start a stream transaction
    pub async fn begin_transaction(
        &self,
        collections: &TransactionCollections,
        options: &BeginTransactionOptions,
    ) -> Result<TransactionId> {
        let body = BeginRequest { collections, options };
        let req = Request::post(self.path(&["_api", "transaction", "begin"])).with_json_body(&body)?;
        let status: TransactionStatus = send(self.conn(), req, &[201]).await?.parse_field("result")?;
        debug!(database = %self.name(), transaction = %status.id, "began transaction");
        Ok(status.id)
    }

    pub async fn commit_transaction(&self, id: &TransactionId) -> Result<()> {
        let req = Request::put(self.transaction_path(id));
        send(self.conn(), req, &[200]).await?;
        Ok(())
    }

    pub async fn abort_transaction(&self, id: &TransactionId) -> Result<()> {
        let req = Request::delete(self.transaction_path(id));
        send(self.conn(), req, &[200]).await?;
        Ok(())
    }

    pub async fn transaction_status(&self, id: &TransactionId) -> Result<TransactionStatus> {
        let req = Request::get(self.transaction_path(id));
        send(self.conn(), req, &[200]).await?.parse_field("result")
    }

    /// Running stream transactions of this database
    pub async fn list_transactions(&self) -> Result<Vec<TransactionStatus>> {
        let req = Request::get(self.path(&["_api", "transaction"]));
        let list: TransactionList = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(list.transactions)
    }

    /// Execute a JavaScript transaction and return what `action` returns
    pub async fn transaction<T: DeserializeOwned>(&self, action: &str, options: &JsTransactionOptions) -> Result<T> {
        if action.trim().is_empty() {
            return Err(ArangoError::invalid_argument("transaction action cannot be empty"));
        }
        let body = JsRequest { action, options };
        let req = Request::post(self.path(&["_api", "transaction"])).with_json_body(&body)?;
        let mut body: Value = send(self.conn(), req, &[200]).await?.parse_body()?;
        // an action returning undefined leaves `result` out
        let result = body.get_mut("result").map(Value::take).unwrap_or(Value::Null);
        Ok(serde_json::from_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::connection::mock::{error_response, MockConnection};
    use crate::connection::HttpMethod;

    #[tokio::test]
    async fn test_stream_transaction_lifecycle() {
        let conn = MockConnection::new();
        conn.push_json(201, json!({"error": false, "code": 201, "result": {"id": "1234", "status": "running"}}));
        conn.push_json(200, json!({"error": false, "code": 200, "result": {"id": "1234", "status": "running"}}));
        conn.push_json(200, json!({"error": false, "code": 200, "result": {"id": "1234", "status": "committed"}}));
        let db = Database::new(conn.clone(), "app");

        let collections = TransactionCollections::default().read(&["users"]).write(&["orders"]);
        let options = BeginTransactionOptions { lock_timeout: Some(5.0), ..Default::default() };
        let id = db.begin_transaction(&collections, &options).await.unwrap();
        assert_eq!(id.as_str(), "1234");
        let body = conn.last_request().body_json().unwrap();
        assert_eq!(body, json!({"collections": {"read": ["users"], "write": ["orders"]}, "lockTimeout": 5.0}));

        let status = db.transaction_status(&id).await.unwrap();
        assert_eq!(status.status, TransactionState::Running);

        db.commit_transaction(&id).await.unwrap();
        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::PUT);
        assert_eq!(req.path, "/_db/app/_api/transaction/1234");

        assert_eq!(id.options().transaction_id.as_deref(), Some("1234"));
    }

    #[tokio::test]
    async fn test_abort_unknown_transaction() {
        let conn = MockConnection::new();
        conn.push(error_response(404, 1655, "transaction not found"));
        let db = Database::new(conn.clone(), "app");
        let err = db.abort_transaction(&TransactionId::new("99")).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(conn.last_request().method, HttpMethod::DELETE);
    }

    #[tokio::test]
    async fn test_list_transactions() {
        let conn = MockConnection::new();
        conn.push_json(200, json!({"transactions": [{"id": "1", "state": "running"}, {"id": "2", "state": "aborted"}]}));
        let list = Database::new(conn.clone(), "app").list_transactions().await.unwrap();
        assert_eq!(list[1].status, TransactionState::Aborted);
    }

    #[tokio::test]
    async fn test_js_transaction() {
        let conn = MockConnection::new();
        conn.push_json(200, json!({"error": false, "code": 200, "result": 42}));
        let db = Database::new(conn.clone(), "app");
        let options = JsTransactionOptions {
            collections: TransactionCollections::default().write(&["c"]),
            params: Some(json!({"n": 41})),
            ..Default::default()
        };
        let result: u32 = db.transaction("function (p) { return p.n + 1; }", &options).await.unwrap();
        assert_eq!(result, 42);
        let body = conn.last_request().body_json().unwrap();
        assert_eq!(body["params"]["n"], 41);
        assert_eq!(body["collections"]["write"][0], "c");

        assert!(db.transaction::<Value>(" ", &options).await.unwrap_err().is_invalid_argument());
    }

    #[tokio::test]
    async fn test_js_transaction_without_result() {
        let conn = MockConnection::new();
        conn.push_json(200, json!({"error": false, "code": 200}));
        conn.push_json(200, json!({"error": false, "code": 200}));
        let db = Database::new(conn.clone(), "app");
        let options = JsTransactionOptions::default();

        let result: Value = db.transaction("function () {}", &options).await.unwrap();
        assert_eq!(result, Value::Null);
        let result: Option<u32> = db.transaction("function () {}", &options).await.unwrap();
        assert_eq!(result, None);
    }
}
