use std::collections::{HashMap, VecDeque};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use crate::client::database::Database;
use crate::client::send;
use crate::common::error::{ArangoError, Result};
use crate::common::utils::path_escape;
use crate::connection::{Connection, Request, RequestOptions};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    full_count: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optimizer: Option<OptimizerOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_runtime: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_on_warning: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allow_retry: Option<bool>,
}

impl QueryOptions {
    fn is_empty(&self) -> bool {
        *self == QueryOptions::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct OptimizerOptions {
    rules: Vec<String>,
}

/// An AQL query with its bind variables and cursor settings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    query: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    bind_vars: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<f64>,
    #[serde(skip_serializing_if = "QueryOptions::is_empty")]
    options: QueryOptions,
}

impl Query {
    pub fn new(aql: impl Into<String>) -> Self {
        Query {
            query: aql.into(),
            ..Default::default()
        }
    }

    pub fn aql(&self) -> &str {
        &self.query
    }

    /// Bind `@name` (or `@@name` for collections)
    pub fn bind<V: Serialize>(mut self, name: impl Into<String>, value: V) -> Result<Self> {
        self.bind_vars.insert(name.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn bind_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bind_vars.insert(name.into(), value);
        self
    }

    /// Ask the server to report the total result count
    pub fn count(mut self, count: bool) -> Self {
        self.count = Some(count);
        self
    }

    pub fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Server-side cursor lifetime in seconds
    pub fn ttl(mut self, secs: f64) -> Self {
        self.ttl = Some(secs);
        self
    }

    pub fn full_count(mut self, value: bool) -> Self {
        self.options.full_count = Some(value);
        self
    }

    /// 1 returns per-phase timings, 2 adds per-node stats
    pub fn profile(mut self, level: u8) -> Self {
        self.options.profile = Some(level);
        self
    }

    pub fn stream(mut self, value: bool) -> Self {
        self.options.stream = Some(value);
        self
    }

    /// Rules like `-all` or `+use-indexes`
    pub fn optimizer_rules<S: AsRef<str>>(mut self, rules: &[S]) -> Self {
        self.options.optimizer = Some(OptimizerOptions {
            rules: rules.iter().map(|r| r.as_ref().to_string()).collect(),
        });
        self
    }

    pub fn max_runtime(mut self, secs: f64) -> Self {
        self.options.max_runtime = Some(secs);
        self
    }

    pub fn fail_on_warning(mut self, value: bool) -> Self {
        self.options.fail_on_warning = Some(value);
        self
    }

    /// Allow re-fetching the last batch after a transport failure
    pub fn allow_retry(mut self, value: bool) -> Self {
        self.options.allow_retry = Some(value);
        self
    }
}

/// Execution statistics reported in the `extra` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CursorStatistics {
    pub writes_executed: u64,
    pub writes_ignored: u64,
    pub scanned_full: u64,
    pub scanned_index: u64,
    pub filtered: u64,
    pub http_requests: u64,
    /// Only present with `full_count`
    pub full_count: Option<u64>,
    pub execution_time: f64,
    pub peak_memory_usage: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryWarning {
    pub code: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct CursorExtra {
    stats: CursorStatistics,
    warnings: Vec<QueryWarning>,
    profile: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    result: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    cached: bool,
    #[serde(default)]
    extra: Option<CursorExtra>,
}

/// Result of parsing a query without running it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryValidation {
    #[serde(default)]
    pub bind_vars: Vec<String>,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub ast: Vec<Value>,
}

/// Output of `POST /_api/explain`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainResult {
    /// Set unless `allPlans` was requested
    #[serde(default)]
    pub plan: Option<Value>,
    #[serde(default)]
    pub plans: Vec<Value>,
    #[serde(default)]
    pub warnings: Vec<QueryWarning>,
    #[serde(default)]
    pub stats: Value,
    #[serde(default)]
    pub cacheable: bool,
}

/// Server-side cursor; batches are fetched lazily
pub struct Cursor {
    db: Database,
    id: Option<String>,
    buffer: VecDeque<Value>,
    has_more: bool,
    count: Option<u64>,
    cached: bool,
    extra: CursorExtra,
    options: RequestOptions,
}

impl Cursor {
    fn from_response(db: Database, resp: CursorResponse, options: RequestOptions) -> Self {
        Cursor {
            db,
            id: resp.id,
            buffer: resp.result.into(),
            has_more: resp.has_more,
            count: resp.count,
            cached: resp.cached,
            extra: resp.extra.unwrap_or_default(),
            options,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// More documents are buffered or can be fetched
    pub fn has_more(&self) -> bool {
        !self.buffer.is_empty() || self.has_more
    }

    /// Total count, if the query asked for it
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Statistics of the most recent batch
    pub fn statistics(&self) -> &CursorStatistics {
        &self.extra.stats
    }

    pub fn warnings(&self) -> &[QueryWarning] {
        &self.extra.warnings
    }

    pub fn profile(&self) -> Option<&Value> {
        self.extra.profile.as_ref()
    }

    async fn fetch_next_batch(&mut self) -> Result<()> {
        let id = self.id.as_deref().ok_or(ArangoError::NoMoreDocuments)?;
        let escaped = path_escape(id);
        let req = self.options.apply(Request::post(self.db.path(&["_api", "cursor", &escaped])));
        debug!(cursor = %id, "fetching next batch");
        let resp: CursorResponse = send(self.db.conn(), req, &[200]).await?.parse_body()?;
        self.buffer.extend(resp.result);
        self.has_more = resp.has_more;
        if resp.count.is_some() {
            self.count = resp.count;
        }
        if let Some(extra) = resp.extra {
            self.extra = extra;
        }
        Ok(())
    }

    /// Next document, or `None` once the cursor is exhausted
    pub async fn next<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        while self.buffer.is_empty() {
            if !self.has_more {
                return Ok(None);
            }
            self.fetch_next_batch().await?;
        }
        match self.buffer.pop_front() {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Like `next` but an exhausted cursor is an error
    pub async fn read_document<T: DeserializeOwned>(&mut self) -> Result<T> {
        self.next().await?.ok_or(ArangoError::NoMoreDocuments)
    }

    pub async fn collect_all<T: DeserializeOwned>(&mut self) -> Result<Vec<T>> {
        let mut all = Vec::with_capacity(self.buffer.len());
        while let Some(item) = self.next().await? {
            all.push(item);
        }
        Ok(all)
    }

    /// Release the cursor on the server
    pub async fn close(&mut self) -> Result<()> {
        self.buffer.clear();
        if !self.has_more {
            return Ok(());
        }
        self.has_more = false;
        let Some(id) = self.id.take() else {
            return Ok(());
        };
        let escaped = path_escape(&id);
        let req = self.options.apply(Request::delete(self.db.path(&["_api", "cursor", &escaped])));
        let resp = self.db.conn().execute(req).await?;
        match resp.status_code {
            202 | 404 => Ok(()),
            _ => Err(resp.as_error()),
        }
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("buffered", &self.buffer.len())
            .field("has_more", &self.has_more)
            .field("count", &self.count)
            .finish()
    }
}

impl Database {
    /// Run an AQL query and return a cursor over its results
    pub async fn query(&self, query: &Query, options: &RequestOptions) -> Result<Cursor> {
        if query.query.trim().is_empty() {
            return Err(ArangoError::invalid_argument("query cannot be empty"));
        }
        let req = options.apply(Request::post(self.path(&["_api", "cursor"]))).with_json_body(query)?;
        let resp: CursorResponse = send(self.conn(), req, &[201]).await?.parse_body()?;
        // batch requests carry only headers (transaction, dirty reads)
        let mut follow_up = RequestOptions::new();
        follow_up.transaction_id = options.transaction_id.clone();
        follow_up.allow_dirty_reads = options.allow_dirty_reads;
        Ok(Cursor::from_response(self.clone(), resp, follow_up))
    }

    /// Parse a query without executing it
    pub async fn validate_query(&self, aql: &str) -> Result<QueryValidation> {
        let req = Request::post(self.path(&["_api", "query"])).with_json_body(&serde_json::json!({ "query": aql }))?;
        send(self.conn(), req, &[200]).await?.parse_body()
    }

    pub async fn explain_query(&self, query: &Query, all_plans: bool) -> Result<ExplainResult> {
        let mut body = serde_json::json!({
            "query": query.query,
            "bindVars": query.bind_vars,
        });
        let mut options = serde_json::to_value(&query.options)?;
        if all_plans {
            options["allPlans"] = Value::Bool(true);
        }
        body["options"] = options;
        let req = Request::post(self.path(&["_api", "explain"])).with_json_body(&body)?;
        send(self.conn(), req, &[200]).await?.parse_body()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::connection::mock::{error_response, MockConnection};
    use crate::connection::HttpMethod;

    #[test]
    fn test_query_serialization() {
        let query = Query::new("FOR u IN @@col FILTER u.age > @age RETURN u")
            .bind("@col", "users").unwrap()
            .bind("age", 21).unwrap()
            .count(true)
            .batch_size(2)
            .full_count(true)
            .optimizer_rules(&["-all", "+use-indexes"]);
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["bindVars"]["@col"], "users");
        assert_eq!(json["batchSize"], 2);
        assert_eq!(json["options"]["fullCount"], true);
        assert_eq!(json["options"]["optimizer"]["rules"][1], "+use-indexes");
        assert!(json.get("ttl").is_none());

        let plain = serde_json::to_value(Query::new("RETURN 1")).unwrap();
        assert_eq!(plain, json!({"query": "RETURN 1"}));
    }

    #[tokio::test]
    async fn test_cursor_batches() {
        let conn = MockConnection::new();
        conn.push_json(201, json!({"result": [1, 2], "hasMore": true, "id": "77", "count": 3,
            "extra": {"stats": {"scannedFull": 3}, "warnings": []}}));
        conn.push_json(200, json!({"result": [3], "hasMore": false, "id": "77"}));
        let db = Database::new(conn.clone(), "app");

        let opts = RequestOptions::new().with_transaction_id("trx1").with_wait_for_sync(true);
        let mut cursor = db.query(&Query::new("FOR i IN 1..3 RETURN i").batch_size(2), &opts).await.unwrap();
        assert_eq!(cursor.count(), Some(3));
        assert_eq!(cursor.statistics().scanned_full, 3);

        let all: Vec<u32> = cursor.collect_all().await.unwrap();
        assert_eq!(all, vec![1, 2, 3]);
        assert!(!cursor.has_more());

        let requests = conn.requests();
        assert_eq!(requests[0].path, "/_db/app/_api/cursor");
        assert_eq!(requests[1].method, HttpMethod::POST);
        assert_eq!(requests[1].path, "/_db/app/_api/cursor/77");
        assert_eq!(requests[1].header("x-arango-trx-id"), Some("trx1"));
        assert_eq!(requests[1].query_param("waitForSync"), None);

        assert!(cursor.read_document::<u32>().await.unwrap_err().is_no_more_documents());
        cursor.close().await.unwrap();
        assert_eq!(conn.request_count(), 2);
    }

    #[tokio::test]
    async fn test_close_open_cursor() {
        let conn = MockConnection::new();
        conn.push_json(201, json!({"result": [{"a": 1}], "hasMore": true, "id": "5"}));
        conn.push(error_response(404, 1600, "cursor not found"));
        let db = Database::new(conn.clone(), "app");

        let mut cursor = db.query(&Query::new("FOR d IN c RETURN d"), &RequestOptions::new()).await.unwrap();
        let first: Value = cursor.read_document().await.unwrap();
        assert_eq!(first["a"], 1);
        cursor.close().await.unwrap();

        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::DELETE);
        assert_eq!(req.path, "/_db/app/_api/cursor/5");
        assert!(!cursor.has_more());
    }

    #[tokio::test]
    async fn test_query_errors() {
        let conn = MockConnection::new();
        conn.push(error_response(400, 1501, "syntax error, unexpected identifier"));
        let db = Database::new(conn.clone(), "app");

        assert!(db.query(&Query::new("  "), &RequestOptions::new()).await.unwrap_err().is_invalid_argument());
        let err = db.query(&Query::new("FOR"), &RequestOptions::new()).await.unwrap_err();
        assert_eq!(err.error_num(), Some(1501));
        assert_eq!(err.http_code(), Some(400));
    }

    #[tokio::test]
    async fn test_validate_and_explain() {
        let conn = MockConnection::new();
        conn.push_json(200, json!({"error": false, "code": 200, "bindVars": ["x"], "collections": ["c"], "ast": [{"type": "root"}]}));
        conn.push_json(200, json!({"plan": {"nodes": []}, "warnings": [], "stats": {"plansCreated": 1}, "cacheable": true}));
        let db = Database::new(conn.clone(), "app");

        let validation = db.validate_query("FOR d IN c FILTER d.x == @x RETURN d").await.unwrap();
        assert_eq!(validation.bind_vars, vec!["x".to_string()]);
        assert_eq!(conn.last_request().path, "/_db/app/_api/query");

        let explained = db.explain_query(&Query::new("RETURN 1").bind_value("x", json!(1)), true).await.unwrap();
        assert!(explained.cacheable);
        let body = conn.last_request().body_json().unwrap();
        assert_eq!(body["options"]["allPlans"], true);
        assert_eq!(body["bindVars"]["x"], 1);
    }
}
