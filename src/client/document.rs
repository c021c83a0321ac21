use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::client::collection::Collection;
use crate::client::send;
use crate::common::document::{validate_key, DocumentMeta, DocumentResponse, EdgeDirection, EdgeDocument};
use crate::common::error::{ArangoError, Result};
use crate::common::utils::path_escape;
use crate::connection::{Connection, Request, RequestOptions, Response};

/// What the import does when a `_key` already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportOnDuplicate {
    Error,
    Update,
    Replace,
    Ignore,
}

impl ImportOnDuplicate {
    fn as_str(&self) -> &'static str {
        match self {
            ImportOnDuplicate::Error => "error",
            ImportOnDuplicate::Update => "update",
            ImportOnDuplicate::Replace => "replace",
            ImportOnDuplicate::Ignore => "ignore",
        }
    }
}

/// Options for `POST /_api/import`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOptions {
    /// Prefix added to `_from` values that lack a collection name
    pub from_prefix: Option<String>,
    pub to_prefix: Option<String>,
    /// Remove all documents before importing
    pub overwrite: bool,
    pub wait_for_sync: bool,
    pub on_duplicate: Option<ImportOnDuplicate>,
    /// Abort the whole import on the first error
    pub complete: bool,
    /// Return per-document error details
    pub details: bool,
}

/// Response of `POST /_api/import`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub empty: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub ignored: u64,
    #[serde(default)]
    pub details: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EdgesResponse {
    edges: Vec<EdgeDocument>,
}

/// Turn each body into an object carrying its `_key`
fn with_keys<K: AsRef<str>, D: Serialize>(keys: &[K], documents: &[D]) -> Result<Vec<Value>> {
    if keys.len() != documents.len() {
        return Err(ArangoError::invalid_argument(format!(
            "got {} keys for {} documents",
            keys.len(),
            documents.len()
        )));
    }
    keys.iter()
        .zip(documents)
        .map(|(key, document)| {
            let key = key.as_ref();
            validate_key(key)?;
            let mut value = serde_json::to_value(document)?;
            let obj = value.as_object_mut().ok_or_else(|| {
                ArangoError::invalid_argument(format!("document for key '{}' is not an object", key))
            })?;
            obj.insert("_key".to_string(), Value::String(key.to_string()));
            Ok(value)
        })
        .collect()
}

/// Per-document results of a multi-document call, one per input. A silent
/// call answers `{}` or only its failed entries, so then only those are
/// returned.
fn multi_results(resp: &Response, options: &RequestOptions) -> Result<Vec<Result<DocumentResponse>>> {
    if options.silent != Some(true) {
        return resp.parse_array_body();
    }
    if resp.body.is_empty() {
        return Ok(Vec::new());
    }
    match resp.parse_body::<Value>()? {
        Value::Array(_) => resp.parse_array_body(),
        Value::Object(obj) if obj.is_empty() => Ok(Vec::new()),
        other => Err(ArangoError::transport(format!("unexpected silent response: {}", other))),
    }
}

fn validate_keys<K: AsRef<str>>(keys: &[K]) -> Result<()> {
    keys.iter().try_for_each(|key| validate_key(key.as_ref()))
}

impl Collection {
    fn document_path(&self, key: Option<&str>) -> String {
        match key {
            Some(key) => {
                let escaped = path_escape(key);
                self.api_path("document", &[&escaped])
            }
            None => self.api_path("document", &[]),
        }
    }

    /// Whether a document with this key exists
    pub async fn document_exists(&self, key: &str, options: &RequestOptions) -> Result<bool> {
        validate_key(key)?;
        let req = options.apply(Request::head(self.document_path(Some(key))));
        let resp = self.database().conn().execute(req).await?;
        match resp.status_code {
            200 => Ok(true),
            404 => Ok(false),
            _ => Err(resp.as_error()),
        }
    }

    /// Read a document and its metadata
    pub async fn read_document<T: DeserializeOwned>(&self, key: &str, options: &RequestOptions) -> Result<(T, DocumentMeta)> {
        validate_key(key)?;
        let req = options.apply(Request::get(self.document_path(Some(key))));
        let body: Value = send(self.database().conn(), req, &[200]).await?.parse_body()?;
        let meta = DocumentMeta::from_document(&body)?;
        Ok((serde_json::from_value(body)?, meta))
    }

    /// Read several documents; one slot per key
    pub async fn read_documents<T: DeserializeOwned, K: AsRef<str>>(
        &self,
        keys: &[K],
        options: &RequestOptions,
    ) -> Result<Vec<Result<T>>> {
        validate_keys(keys)?;
        let keys: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
        let req = options
            .apply(Request::put(self.document_path(None)))
            .with_query("onlyget", true)
            .with_json_body(&keys)?;
        let resp = send(self.database().conn(), req, &[200]).await?;
        Ok(resp
            .parse_array_body::<Value>()?
            .into_iter()
            .map(|item| item.and_then(|value| Ok(serde_json::from_value(value)?)))
            .collect())
    }

    pub async fn create_document<D: Serialize + ?Sized>(&self, document: &D, options: &RequestOptions) -> Result<DocumentResponse> {
        let req = options.apply(Request::post(self.document_path(None))).with_json_body(document)?;
        send(self.database().conn(), req, &[201, 202]).await?.parse_body()
    }

    /// Insert several documents. With `silent` only failed entries are reported.
    pub async fn create_documents<D: Serialize>(&self, documents: &[D], options: &RequestOptions) -> Result<Vec<Result<DocumentResponse>>> {
        let req = options.apply(Request::post(self.document_path(None))).with_json_body(documents)?;
        let resp = send(self.database().conn(), req, &[201, 202]).await?;
        multi_results(&resp, options)
    }

    /// Partially update a document
    pub async fn update_document<D: Serialize + ?Sized>(&self, key: &str, patch: &D, options: &RequestOptions) -> Result<DocumentResponse> {
        validate_key(key)?;
        let req = options.apply(Request::patch(self.document_path(Some(key)))).with_json_body(patch)?;
        send(self.database().conn(), req, &[201, 202]).await?.parse_body()
    }

    pub async fn update_documents<K: AsRef<str>, D: Serialize>(
        &self,
        keys: &[K],
        patches: &[D],
        options: &RequestOptions,
    ) -> Result<Vec<Result<DocumentResponse>>> {
        let body = with_keys(keys, patches)?;
        let req = options.apply(Request::patch(self.document_path(None))).with_json_body(&body)?;
        let resp = send(self.database().conn(), req, &[201, 202]).await?;
        multi_results(&resp, options)
    }

    /// Replace a document entirely
    pub async fn replace_document<D: Serialize + ?Sized>(&self, key: &str, document: &D, options: &RequestOptions) -> Result<DocumentResponse> {
        validate_key(key)?;
        let req = options.apply(Request::put(self.document_path(Some(key)))).with_json_body(document)?;
        send(self.database().conn(), req, &[201, 202]).await?.parse_body()
    }

    pub async fn replace_documents<K: AsRef<str>, D: Serialize>(
        &self,
        keys: &[K],
        documents: &[D],
        options: &RequestOptions,
    ) -> Result<Vec<Result<DocumentResponse>>> {
        let body = with_keys(keys, documents)?;
        let req = options.apply(Request::put(self.document_path(None))).with_json_body(&body)?;
        let resp = send(self.database().conn(), req, &[201, 202]).await?;
        multi_results(&resp, options)
    }

    pub async fn remove_document(&self, key: &str, options: &RequestOptions) -> Result<DocumentResponse> {
        validate_key(key)?;
        let req = options.apply(Request::delete(self.document_path(Some(key))));
        send(self.database().conn(), req, &[200, 202]).await?.parse_body()
    }

    pub async fn remove_documents<K: AsRef<str>>(&self, keys: &[K], options: &RequestOptions) -> Result<Vec<Result<DocumentResponse>>> {
        validate_keys(keys)?;
        let keys: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
        let req = options.apply(Request::delete(self.document_path(None))).with_json_body(&keys)?;
        let resp = send(self.database().conn(), req, &[200, 202]).await?;
        multi_results(&resp, options)
    }

    /// Bulk import documents given as a JSON array
    pub async fn import_documents<D: Serialize>(&self, documents: &[D], options: &ImportOptions) -> Result<ImportResult> {
        let mut req = Request::post(self.database().path(&["_api", "import"]))
            .with_query("collection", self.name())
            .with_query("type", "list")
            .with_json_body(documents)?;
        if let Some(prefix) = &options.from_prefix {
            req.set_query("fromPrefix", prefix);
        }
        if let Some(prefix) = &options.to_prefix {
            req.set_query("toPrefix", prefix);
        }
        if options.overwrite {
            req.set_query("overwrite", true);
        }
        if options.wait_for_sync {
            req.set_query("waitForSync", true);
        }
        if let Some(on_duplicate) = options.on_duplicate {
            req.set_query("onDuplicate", on_duplicate.as_str());
        }
        if options.complete {
            req.set_query("complete", true);
        }
        if options.details {
            req.set_query("details", true);
        }
        send(self.database().conn(), req, &[201]).await?.parse_body()
    }

    /// Edges of this edge collection starting or ending at `vertex_id`
    pub async fn edges(&self, vertex_id: &str, direction: EdgeDirection) -> Result<Vec<EdgeDocument>> {
        if vertex_id.is_empty() {
            return Err(ArangoError::invalid_argument("vertex id cannot be empty"));
        }
        let mut req = Request::get(self.api_path("edges", &[])).with_query("vertex", vertex_id);
        if direction != EdgeDirection::Any {
            req.set_query("direction", direction.as_str());
        }
        let resp: EdgesResponse = send(self.database().conn(), req, &[200]).await?.parse_body()?;
        Ok(resp.edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use serde_json::json;
    use crate::client::database::Database;
    use crate::connection::mock::{error_response, json_response, MockConnection};
    use crate::connection::{HttpMethod, Response};

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Order {
        item: String,
        qty: u32,
    }

    fn orders(conn: &Arc<MockConnection>) -> Collection {
        Collection::new(Database::new(conn.clone(), "shop"), "orders")
    }

    #[tokio::test]
    async fn test_document_exists() {
        let conn = MockConnection::new();
        conn.push(Response::new(200));
        conn.push(Response::new(404));
        conn.push(Response::new(412));
        let col = orders(&conn);
        let opts = RequestOptions::new().with_revision("_r1");

        assert!(col.document_exists("a", &opts).await.unwrap());
        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::HEAD);
        assert_eq!(req.path, "/_db/shop/_api/document/orders/a");
        assert_eq!(req.header("if-match"), Some("_r1"));

        assert!(!col.document_exists("b", &opts).await.unwrap());
        assert!(col.document_exists("c", &opts).await.unwrap_err().is_precondition_failed());
        assert!(col.document_exists("", &opts).await.unwrap_err().is_invalid_argument());
        assert_eq!(conn.request_count(), 3);
    }

    #[tokio::test]
    async fn test_read_document() {
        let conn = MockConnection::new();
        conn.push_json(200, json!({"_key": "a", "_id": "orders/a", "_rev": "_r", "item": "pen", "qty": 2}));
        conn.push(error_response(404, 1202, "document not found"));
        let col = orders(&conn);

        let (order, meta): (Order, DocumentMeta) = col.read_document("a", &RequestOptions::new()).await.unwrap();
        assert_eq!(order, Order { item: "pen".into(), qty: 2 });
        assert_eq!(meta.rev, "_r");

        let err = col.read_document::<Order>("x", &RequestOptions::new()).await.unwrap_err();
        assert!(err.is_data_source_or_document_not_found());
    }

    #[tokio::test]
    async fn test_read_documents_mixed() {
        let conn = MockConnection::new();
        conn.push_json(200, json!([
            {"_key": "a", "_id": "orders/a", "_rev": "1", "item": "pen", "qty": 1},
            {"error": true, "errorNum": 1202, "errorMessage": "document not found"}
        ]));
        let col = orders(&conn);
        let docs = col.read_documents::<Order, _>(&["a", "b"], &RequestOptions::new()).await.unwrap();
        assert_eq!(docs[0].as_ref().unwrap().qty, 1);
        assert!(docs[1].as_ref().unwrap_err().is_not_found());

        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::PUT);
        assert_eq!(req.query_param("onlyget"), Some("true"));
        assert_eq!(req.body_json().unwrap(), json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_create_document_with_return_new() {
        let conn = MockConnection::new();
        conn.push_json(202, json!({"_key": "k", "_id": "orders/k", "_rev": "_1", "new": {"_key": "k", "item": "ink", "qty": 3}}));
        let col = orders(&conn);
        let opts = RequestOptions::new().with_return_new(true).with_wait_for_sync(true);

        let resp = col.create_document(&Order { item: "ink".into(), qty: 3 }, &opts).await.unwrap();
        assert_eq!(resp.key(), "k");
        let new: Order = resp.new_as().unwrap().unwrap();
        assert_eq!(new.qty, 3);

        let req = conn.last_request();
        assert_eq!(req.path, "/_db/shop/_api/document/orders");
        assert_eq!(req.query_param("returnNew"), Some("true"));
        assert_eq!(req.query_param("waitForSync"), Some("true"));
    }

    #[tokio::test]
    async fn test_create_document_silent() {
        let conn = MockConnection::new();
        conn.push_json(201, json!({}));
        let resp = orders(&conn)
            .create_document(&json!({"a": 1}), &RequestOptions::new().with_silent(true))
            .await
            .unwrap();
        assert!(resp.meta.id.is_empty());
    }

    #[tokio::test]
    async fn test_create_documents_silent() {
        let conn = MockConnection::new();
        conn.push_json(202, json!({}));
        conn.push_json(202, json!([]));
        conn.push_json(202, json!([
            {"error": true, "errorNum": 1210, "errorMessage": "unique constraint violated"}
        ]));
        conn.push_json(200, json!({}));
        let col = orders(&conn);
        let silent = RequestOptions::new().with_silent(true);
        let docs = [json!({"_key": "1"}), json!({"_key": "2"})];

        assert!(col.create_documents(&docs, &silent).await.unwrap().is_empty());
        assert_eq!(conn.last_request().query_param("silent"), Some("true"));
        assert!(col.create_documents(&docs, &silent).await.unwrap().is_empty());

        let failed = col.create_documents(&docs, &silent).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].as_ref().unwrap_err().is_conflict());

        assert!(col.remove_documents(&["1", "2"], &silent).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_documents_conflict_slot() {
        let conn = MockConnection::new();
        conn.push_json(202, json!([
            {"_key": "1", "_id": "orders/1", "_rev": "a"},
            {"error": true, "errorNum": 1210, "errorMessage": "unique constraint violated"}
        ]));
        let results = orders(&conn)
            .create_documents(&[json!({"_key": "1"}), json!({"_key": "1"})], &RequestOptions::new())
            .await
            .unwrap();
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.error_num(), Some(1210));
    }

    #[tokio::test]
    async fn test_update_documents_merges_keys() {
        let conn = MockConnection::new();
        conn.push_json(202, json!([
            {"_key": "a", "_id": "orders/a", "_rev": "2", "_oldRev": "1"},
            {"_key": "b", "_id": "orders/b", "_rev": "3", "_oldRev": "2"}
        ]));
        let col = orders(&conn);
        let results = col
            .update_documents(&["a", "b"], &[json!({"qty": 1}), json!({"qty": 2})], &RequestOptions::new().with_keep_null(false))
            .await
            .unwrap();
        assert_eq!(results[1].as_ref().unwrap().meta.old_rev.as_deref(), Some("2"));

        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::PATCH);
        assert_eq!(req.query_param("keepNull"), Some("false"));
        assert_eq!(req.body_json().unwrap(), json!([{"_key": "a", "qty": 1}, {"_key": "b", "qty": 2}]));

        let err = col.update_documents(&["a"], &[json!({}), json!({})], &RequestOptions::new()).await.unwrap_err();
        assert!(err.is_invalid_argument());
        let err = col.replace_documents(&["a"], &[json!(5)], &RequestOptions::new()).await.unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(conn.request_count(), 1);
    }

    #[tokio::test]
    async fn test_replace_and_remove() {
        let conn = MockConnection::new();
        conn.push(error_response(412, 1200, "conflict, _rev values do not match"));
        conn.push_json(200, json!({"_key": "a", "_id": "orders/a", "_rev": "5", "old": {"item": "pen", "qty": 1}}));
        let col = orders(&conn);

        let err = col
            .replace_document("a", &Order { item: "x".into(), qty: 0 }, &RequestOptions::new().with_revision("4"))
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed());

        let resp = col.remove_document("a", &RequestOptions::new().with_return_old(true)).await.unwrap();
        let old: Order = resp.old_as().unwrap().unwrap();
        assert_eq!(old.item, "pen");
        assert_eq!(conn.last_request().method, HttpMethod::DELETE);
    }

    #[tokio::test]
    async fn test_remove_documents() {
        let conn = MockConnection::new();
        conn.push(json_response(200, json!([{"_key": "a", "_id": "orders/a", "_rev": "1"}])));
        let results = orders(&conn).remove_documents(&["a"], &RequestOptions::new()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(conn.last_request().body_json().unwrap(), json!(["a"]));
    }

    #[tokio::test]
    async fn test_import_documents() {
        let conn = MockConnection::new();
        conn.push_json(201, json!({"error": false, "created": 2, "errors": 0, "empty": 0, "updated": 0, "ignored": 1}));
        let options = ImportOptions {
            on_duplicate: Some(ImportOnDuplicate::Ignore),
            complete: true,
            ..Default::default()
        };
        let result = orders(&conn)
            .import_documents(&[json!({"a": 1}), json!({"a": 2}), json!({"_key": "x"})], &options)
            .await
            .unwrap();
        assert_eq!(result.created, 2);
        assert_eq!(result.ignored, 1);

        let req = conn.last_request();
        assert_eq!(req.path, "/_db/shop/_api/import");
        assert_eq!(req.query_param("collection"), Some("orders"));
        assert_eq!(req.query_param("type"), Some("list"));
        assert_eq!(req.query_param("onDuplicate"), Some("ignore"));
        assert_eq!(req.query_param("overwrite"), None);
    }

    #[tokio::test]
    async fn test_edges() {
        let conn = MockConnection::new();
        conn.push_json(200, json!({"edges": [
            {"_key": "e1", "_id": "knows/e1", "_rev": "1", "_from": "people/a", "_to": "people/b"}
        ], "stats": {"scannedIndex": 1}}));
        let knows = Collection::new(Database::new(conn.clone(), "shop"), "knows");
        let edges = knows.edges("people/a", EdgeDirection::Out).await.unwrap();
        assert_eq!(edges[0].to.key(), "b");

        let req = conn.last_request();
        assert_eq!(req.path, "/_db/shop/_api/edges/knows");
        assert_eq!(req.query_param("direction"), Some("out"));
        assert_eq!(req.query_param("vertex"), Some("people/a"));
    }
}
