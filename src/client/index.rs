use std::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;
use crate::client::collection::Collection;
use crate::client::send;
use crate::common::error::{ArangoError, Result};
use crate::common::utils::path_escape;
use crate::connection::Request;

/// Index types known to the server. Unknown names are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexType {
    Primary,
    Edge,
    Persistent,
    Hash,
    Skiplist,
    Ttl,
    Geo,
    Fulltext,
    Inverted,
    Zkd,
    Mdi,
    MdiPrefixed,
    Vector,
    Other(String),
}

impl IndexType {
    pub fn as_str(&self) -> &str {
        match self {
            IndexType::Primary => "primary",
            IndexType::Edge => "edge",
            IndexType::Persistent => "persistent",
            IndexType::Hash => "hash",
            IndexType::Skiplist => "skiplist",
            IndexType::Ttl => "ttl",
            IndexType::Geo => "geo",
            IndexType::Fulltext => "fulltext",
            IndexType::Inverted => "inverted",
            IndexType::Zkd => "zkd",
            IndexType::Mdi => "mdi",
            IndexType::MdiPrefixed => "mdi-prefixed",
            IndexType::Vector => "vector",
            IndexType::Other(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "primary" => IndexType::Primary,
            "edge" => IndexType::Edge,
            "persistent" => IndexType::Persistent,
            "hash" => IndexType::Hash,
            "skiplist" => IndexType::Skiplist,
            "ttl" => IndexType::Ttl,
            "geo" | "geo1" | "geo2" => IndexType::Geo,
            "fulltext" => IndexType::Fulltext,
            "inverted" => IndexType::Inverted,
            "zkd" => IndexType::Zkd,
            "mdi" => IndexType::Mdi,
            "mdi-prefixed" => IndexType::MdiPrefixed,
            "vector" => IndexType::Vector,
            other => IndexType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for IndexType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for IndexType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(IndexType::from_name(&name))
    }
}

/// Inverted indexes describe fields as objects; other types use plain paths.
fn field_names<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    let values = Vec::<Value>::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|value| match value {
            Value::String(name) => Ok(name),
            Value::Object(obj) => obj
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| serde::de::Error::custom("index field object without name")),
            other => Err(serde::de::Error::custom(format!("unexpected index field {}", other))),
        })
        .collect()
}

/// An index as reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    /// `<collection>/<numeric id>`
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub index_type: IndexType,
    #[serde(default, deserialize_with = "field_names")]
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub sparse: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deduplicate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimates: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectivity_estimate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_after: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_json: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_background: Option<bool>,
    /// Type specific attributes not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Index {
    /// Numeric part of the id
    pub fn key(&self) -> &str {
        self.id.split_once('/').map_or(self.id.as_str(), |(_, key)| key)
    }
}

/// Definition sent to `POST /_api/index`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexOptions {
    #[serde(rename = "type")]
    pub index_type: IndexType,
    pub fields: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deduplicate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_json: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_polygons: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_value_types: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_background: Option<bool>,
    /// Attributes passed through unchanged (e.g. inverted index analyzers)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IndexOptions {
    pub fn new<S: AsRef<str>>(index_type: IndexType, fields: &[S]) -> Self {
        IndexOptions {
            index_type,
            fields: fields.iter().map(|f| Value::String(f.as_ref().to_string())).collect(),
            name: None,
            unique: None,
            sparse: None,
            deduplicate: None,
            estimates: None,
            cache_enabled: None,
            stored_values: None,
            expire_after: None,
            geo_json: None,
            legacy_polygons: None,
            min_length: None,
            field_value_types: None,
            prefix_fields: None,
            in_background: None,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = Some(unique);
        self
    }

    pub fn with_sparse(mut self, sparse: bool) -> Self {
        self.sparse = Some(sparse);
        self
    }

    pub fn with_in_background(mut self, value: bool) -> Self {
        self.in_background = Some(value);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Deserialize)]
struct IndexList {
    indexes: Vec<Index>,
}

impl Collection {
    /// Index id as used in URLs: `<collection>/<id or name>`
    fn index_path(&self, id_or_name: &str) -> Result<String> {
        if id_or_name.is_empty() {
            return Err(ArangoError::invalid_argument("index id cannot be empty"));
        }
        let local = match id_or_name.split_once('/') {
            Some((collection, local)) if collection == self.name() => local,
            Some((collection, _)) => {
                return Err(ArangoError::invalid_argument(format!(
                    "index '{}' belongs to collection '{}', not '{}'",
                    id_or_name, collection, self.name()
                )));
            }
            None => id_or_name,
        };
        let escaped = path_escape(local);
        Ok(self.api_path("index", &[&escaped]))
    }

    pub async fn indexes(&self) -> Result<Vec<Index>> {
        let req = Request::get(self.database().path(&["_api", "index"])).with_query("collection", self.name());
        let list: IndexList = send(self.database().conn(), req, &[200]).await?.parse_body()?;
        Ok(list.indexes)
    }

    /// Index by id (`col/123`, `123`) or by name
    pub async fn index(&self, id_or_name: &str) -> Result<Index> {
        let req = Request::get(self.index_path(id_or_name)?);
        send(self.database().conn(), req, &[200]).await?.parse_body()
    }

    pub async fn index_exists(&self, id_or_name: &str) -> Result<bool> {
        match self.index(id_or_name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Drop an index; returns the removed id
    pub async fn remove_index(&self, id_or_name: &str) -> Result<String> {
        let req = Request::delete(self.index_path(id_or_name)?);
        let resp: Value = send(self.database().conn(), req, &[200]).await?.parse_body()?;
        Ok(resp.get("id").and_then(Value::as_str).unwrap_or(id_or_name).to_string())
    }

    /// Create the index unless an identical one exists.
    /// Returns the index and whether it was newly created.
    pub async fn ensure_index(&self, options: &IndexOptions) -> Result<(Index, bool)> {
        let req = Request::post(self.database().path(&["_api", "index"]))
            .with_query("collection", self.name())
            .with_json_body(options)?;
        let resp = send(self.database().conn(), req, &[200, 201]).await?;
        let created = resp.status_code == 201;
        debug!(collection = %self.name(), index_type = %options.index_type, created, "ensured index");
        Ok((resp.parse_body()?, created))
    }

    pub async fn ensure_persistent_index<S: AsRef<str>>(&self, fields: &[S], unique: bool, sparse: bool) -> Result<(Index, bool)> {
        let options = IndexOptions::new(IndexType::Persistent, fields)
            .with_unique(unique)
            .with_sparse(sparse);
        self.ensure_index(&options).await
    }

    /// Documents expire `expire_after` seconds after the timestamp in `field`
    pub async fn ensure_ttl_index(&self, field: &str, expire_after: u64) -> Result<(Index, bool)> {
        let mut options = IndexOptions::new(IndexType::Ttl, &[field]);
        options.expire_after = Some(expire_after);
        self.ensure_index(&options).await
    }

    pub async fn ensure_geo_index<S: AsRef<str>>(&self, fields: &[S], geo_json: bool) -> Result<(Index, bool)> {
        let mut options = IndexOptions::new(IndexType::Geo, fields);
        options.geo_json = Some(geo_json);
        self.ensure_index(&options).await
    }

    pub async fn ensure_fulltext_index(&self, field: &str, min_length: Option<u32>) -> Result<(Index, bool)> {
        let mut options = IndexOptions::new(IndexType::Fulltext, &[field]);
        options.min_length = min_length;
        self.ensure_index(&options).await
    }

    /// Fields may be plain paths or full field objects
    pub async fn ensure_inverted_index(&self, fields: Vec<Value>, analyzer: Option<&str>) -> Result<(Index, bool)> {
        let mut options = IndexOptions::new::<&str>(IndexType::Inverted, &[]);
        options.fields = fields;
        if let Some(analyzer) = analyzer {
            options.extra.insert("analyzer".to_string(), Value::String(analyzer.to_string()));
        }
        self.ensure_index(&options).await
    }

    /// Multi-dimensional index; `field_value_types` is currently always `double`
    pub async fn ensure_mdi_index<S: AsRef<str>>(&self, fields: &[S], unique: bool) -> Result<(Index, bool)> {
        let mut options = IndexOptions::new(IndexType::Mdi, fields).with_unique(unique);
        options.field_value_types = Some("double".to_string());
        self.ensure_index(&options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::client::database::Database;
    use crate::connection::mock::{error_response, MockConnection};
    use crate::connection::HttpMethod;

    fn users(conn: &std::sync::Arc<MockConnection>) -> Collection {
        Collection::new(Database::new(conn.clone(), "app"), "users")
    }

    #[test]
    fn test_index_type_names() {
        assert_eq!(IndexType::from_name("mdi-prefixed"), IndexType::MdiPrefixed);
        assert_eq!(IndexType::from_name("geo2"), IndexType::Geo);
        assert_eq!(IndexType::from_name("rtree"), IndexType::Other("rtree".into()));
        assert_eq!(serde_json::to_value(IndexType::Other("rtree".into())).unwrap(), json!("rtree"));
    }

    #[tokio::test]
    async fn test_indexes() {
        let conn = MockConnection::new();
        conn.push_json(200, json!({"error": false, "code": 200, "indexes": [
            {"id": "users/0", "name": "primary", "type": "primary", "fields": ["_key"], "unique": true, "sparse": false},
            {"id": "users/42", "name": "inv", "type": "inverted", "fields": [{"name": "title", "analyzer": "text_en"}]}
        ]}));
        let indexes = users(&conn).indexes().await.unwrap();
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0].index_type, IndexType::Primary);
        assert_eq!(indexes[1].fields, vec!["title".to_string()]);
        assert_eq!(indexes[1].key(), "42");

        let req = conn.last_request();
        assert_eq!(req.path, "/_db/app/_api/index");
        assert_eq!(req.query_param("collection"), Some("users"));
    }

    #[tokio::test]
    async fn test_ensure_persistent_index() {
        let conn = MockConnection::new();
        conn.push_json(201, json!({"id": "users/7", "name": "idx_7", "type": "persistent",
            "fields": ["email"], "unique": true, "sparse": false, "isNewlyCreated": true}));
        conn.push_json(200, json!({"id": "users/7", "name": "idx_7", "type": "persistent",
            "fields": ["email"], "unique": true, "sparse": false, "isNewlyCreated": false}));
        let col = users(&conn);

        let (index, created) = col.ensure_persistent_index(&["email"], true, false).await.unwrap();
        assert!(created);
        assert!(index.unique);
        assert_eq!(index.extra["isNewlyCreated"], true);
        let body = conn.last_request().body_json().unwrap();
        assert_eq!(body, json!({"type": "persistent", "fields": ["email"], "unique": true, "sparse": false}));

        let (_, created) = col.ensure_persistent_index(&["email"], true, false).await.unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn test_ensure_ttl_and_inverted() {
        let conn = MockConnection::new();
        conn.push_json(201, json!({"id": "users/8", "type": "ttl", "fields": ["createdAt"], "expireAfter": 3600}));
        conn.push_json(201, json!({"id": "users/9", "type": "inverted", "fields": [{"name": "bio"}]}));
        let col = users(&conn);

        let (index, _) = col.ensure_ttl_index("createdAt", 3600).await.unwrap();
        assert_eq!(index.expire_after, Some(3600));

        col.ensure_inverted_index(vec![json!({"name": "bio"})], Some("text_en")).await.unwrap();
        let body = conn.last_request().body_json().unwrap();
        assert_eq!(body["analyzer"], "text_en");
        assert_eq!(body["fields"], json!([{"name": "bio"}]));
    }

    #[tokio::test]
    async fn test_index_lookup_and_remove() {
        let conn = MockConnection::new();
        conn.push(error_response(404, 1212, "index not found"));
        conn.push_json(200, json!({"error": false, "code": 200, "id": "users/42"}));
        let col = users(&conn);

        assert!(!col.index_exists("users/42").await.unwrap());
        assert_eq!(conn.last_request().path, "/_db/app/_api/index/users/42");

        assert_eq!(col.remove_index("42").await.unwrap(), "users/42");
        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::DELETE);
        assert_eq!(req.path, "/_db/app/_api/index/users/42");

        assert!(col.index("orders/1").await.unwrap_err().is_invalid_argument());
        assert!(col.index("").await.unwrap_err().is_invalid_argument());
    }
}
