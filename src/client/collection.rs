use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use crate::client::database::Database;
use crate::client::send;
use crate::common::error::{ArangoError, Result};
use crate::common::utils::{path_escape, validate_collection_name};
use crate::connection::Request;

/// Collection type enumeration, sent as its numeric value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CollectionType {
    Unknown = 0,
    Document = 2,
    Edge = 3,
}

impl CollectionType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            2 => CollectionType::Document,
            3 => CollectionType::Edge,
            _ => CollectionType::Unknown,
        }
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    pub fn is_edge(&self) -> bool {
        matches!(self, CollectionType::Edge)
    }
}

impl Default for CollectionType {
    fn default() -> Self {
        CollectionType::Document
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionType::Unknown => write!(f, "unknown"),
            CollectionType::Document => write!(f, "document"),
            CollectionType::Edge => write!(f, "edge"),
        }
    }
}

impl Serialize for CollectionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.as_u32())
    }
}

impl<'de> Deserialize<'de> for CollectionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(CollectionType::from_u32(u32::deserialize(deserializer)?))
    }
}

/// Collection status as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CollectionStatus {
    Unknown = 0,
    NewBorn = 1,
    Unloaded = 2,
    Loaded = 3,
    Unloading = 4,
    Deleted = 5,
    Loading = 6,
}

impl CollectionStatus {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => CollectionStatus::NewBorn,
            2 => CollectionStatus::Unloaded,
            3 => CollectionStatus::Loaded,
            4 => CollectionStatus::Unloading,
            5 => CollectionStatus::Deleted,
            6 => CollectionStatus::Loading,
            _ => CollectionStatus::Unknown,
        }
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

impl Default for CollectionStatus {
    fn default() -> Self {
        CollectionStatus::Unknown
    }
}

impl Serialize for CollectionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.as_u32())
    }
}

impl<'de> Deserialize<'de> for CollectionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(CollectionStatus::from_u32(u32::deserialize(deserializer)?))
    }
}

/// Number of copies of each shard, or `"satellite"` for a copy on every server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationFactor {
    Factor(u32),
    Satellite,
}

impl Serialize for ReplicationFactor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ReplicationFactor::Factor(n) => serializer.serialize_u32(*n),
            ReplicationFactor::Satellite => serializer.serialize_str("satellite"),
        }
    }
}

impl<'de> Deserialize<'de> for ReplicationFactor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .map(|n| ReplicationFactor::Factor(n as u32))
                .ok_or_else(|| serde::de::Error::custom("replication factor must be a positive integer")),
            Value::String(s) if s == "satellite" => Ok(ReplicationFactor::Satellite),
            other => Err(serde::de::Error::custom(format!("invalid replication factor {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyGeneratorType {
    Traditional,
    Autoincrement,
    Uuid,
    Padded,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyOptions {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub generator: Option<KeyGeneratorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_user_keys: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_value: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardingStrategy {
    #[serde(rename = "community-compat")]
    CommunityCompat,
    #[serde(rename = "enterprise-compat")]
    EnterpriseCompat,
    #[serde(rename = "enterprise-smart-edge-compat")]
    EnterpriseSmartEdgeCompat,
    #[serde(rename = "hash")]
    Hash,
    #[serde(rename = "enterprise-hash-smart-edge")]
    EnterpriseHashSmartEdge,
    #[serde(rename = "enterprise-hex-smart-vertex")]
    EnterpriseHexSmartVertex,
}

/// Response of `GET /_api/collection/{name}/properties`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionProperties {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: CollectionStatus,
    #[serde(rename = "type", default)]
    pub collection_type: CollectionType,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub wait_for_sync: bool,
    #[serde(default)]
    pub globally_unique_id: String,
    #[serde(default)]
    pub key_options: KeyOptions,
    #[serde(default)]
    pub cache_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_values: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_shards: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<ReplicationFactor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_concern: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharding_strategy: Option<ShardingStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribute_shards_like: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_join_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_smart: Option<bool>,
}

/// Options for `POST /_api/collection`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionOptions {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub collection_type: Option<CollectionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_sync: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_options: Option<KeyOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_shards: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard_keys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<ReplicationFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_concern: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharding_strategy: Option<ShardingStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribute_shards_like: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_join_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_system: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_values: Option<Value>,
    /// Query parameter: wait until all replicas are created
    #[serde(skip)]
    pub wait_for_sync_replication: Option<bool>,
    /// Query parameter: fail if there are not enough servers for the replication factor
    #[serde(skip)]
    pub enforce_replication_factor: Option<bool>,
}

impl CreateCollectionOptions {
    pub fn edge() -> Self {
        CreateCollectionOptions {
            collection_type: Some(CollectionType::Edge),
            ..Default::default()
        }
    }

    pub fn with_number_of_shards(mut self, shards: u32) -> Self {
        self.number_of_shards = Some(shards);
        self
    }

    pub fn with_replication_factor(mut self, factor: ReplicationFactor) -> Self {
        self.replication_factor = Some(factor);
        self
    }

    pub fn with_key_options(mut self, key_options: KeyOptions) -> Self {
        self.key_options = Some(key_options);
        self
    }

    pub fn with_wait_for_sync(mut self, wait: bool) -> Self {
        self.wait_for_sync = Some(wait);
        self
    }
}

/// Options for `PUT /_api/collection/{name}/properties`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCollectionPropertiesOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_sync: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<ReplicationFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_concern: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_values: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionChecksum {
    pub checksum: String,
    pub revision: String,
}

/// Document count plus the storage figures of `GET .../figures`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStatistics {
    pub count: u64,
    #[serde(default)]
    pub figures: Value,
}

#[derive(Debug, Deserialize)]
struct CollectionEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: CollectionStatus,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct RevisionResponse {
    revision: String,
}

#[derive(Debug, Deserialize)]
struct ShardsResponse {
    shards: HashMap<String, Vec<String>>,
}

/// Handle to a collection
#[derive(Clone)]
pub struct Collection {
    db: Database,
    name: String,
}

impl Database {
    /// Handle to an existing collection
    pub async fn collection(&self, name: &str) -> Result<Collection> {
        validate_collection_name(name)?;
        let escaped = path_escape(name);
        let req = Request::get(self.path(&["_api", "collection", &escaped]));
        send(self.conn(), req, &[200]).await?;
        Ok(Collection::new(self.clone(), name))
    }

    /// Handle to a collection without checking that it exists
    pub fn collection_unchecked(&self, name: &str) -> Collection {
        Collection::new(self.clone(), name)
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        match self.collection(name).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// All collections of the database, system collections included
    pub async fn collections(&self) -> Result<Vec<Collection>> {
        let req = Request::get(self.path(&["_api", "collection"]));
        let entries: Vec<CollectionEntry> = send(self.conn(), req, &[200]).await?.parse_field("result")?;
        Ok(entries.into_iter().map(|e| Collection::new(self.clone(), &e.name)).collect())
    }

    pub async fn create_collection(&self, name: &str, options: Option<&CreateCollectionOptions>) -> Result<Collection> {
        validate_collection_name(name)?;
        let mut body = match options {
            Some(options) => serde_json::to_value(options)?,
            None => Value::Object(Default::default()),
        };
        body["name"] = Value::String(name.to_string());

        let mut req = Request::post(self.path(&["_api", "collection"])).with_json_body(&body)?;
        if let Some(options) = options {
            if let Some(wait) = options.wait_for_sync_replication {
                req.set_query("waitForSyncReplication", if wait { 1 } else { 0 });
            }
            if let Some(enforce) = options.enforce_replication_factor {
                req.set_query("enforceReplicationFactor", if enforce { 1 } else { 0 });
            }
        }
        send(self.conn(), req, &[200, 201]).await?;
        Ok(Collection::new(self.clone(), name))
    }
}

impl Collection {
    pub(crate) fn new(db: Database, name: &str) -> Self {
        Collection {
            db,
            name: name.to_string(),
        }
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database the collection lives in
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// `/_db/<db>/_api/collection/<name>/<parts...>`
    fn path(&self, parts: &[&str]) -> String {
        let escaped = path_escape(&self.name);
        let mut all = vec!["_api", "collection", escaped.as_str()];
        all.extend_from_slice(parts);
        self.db.path(&all)
    }

    /// `/_db/<db>/_api/<api>/<name>/<parts...>` for the document, index and import APIs
    pub(crate) fn api_path(&self, api: &str, parts: &[&str]) -> String {
        let escaped = path_escape(&self.name);
        let mut all = vec!["_api", api, escaped.as_str()];
        all.extend_from_slice(parts);
        self.db.path(&all)
    }

    pub async fn properties(&self) -> Result<CollectionProperties> {
        let req = Request::get(self.path(&["properties"]));
        send(self.db.conn(), req, &[200]).await?.parse_body()
    }

    pub async fn set_properties(&self, options: &SetCollectionPropertiesOptions) -> Result<CollectionProperties> {
        let req = Request::put(self.path(&["properties"])).with_json_body(options)?;
        send(self.db.conn(), req, &[200]).await?.parse_body()
    }

    pub async fn status(&self) -> Result<CollectionStatus> {
        let req = Request::get(self.path(&[]));
        let resp: StatusResponse = send(self.db.conn(), req, &[200]).await?.parse_body()?;
        Ok(resp.status)
    }

    /// Number of documents
    pub async fn count(&self) -> Result<u64> {
        let req = Request::get(self.path(&["count"]));
        let resp: CountResponse = send(self.db.conn(), req, &[200]).await?.parse_body()?;
        Ok(resp.count)
    }

    pub async fn statistics(&self) -> Result<CollectionStatistics> {
        let req = Request::get(self.path(&["figures"]));
        send(self.db.conn(), req, &[200]).await?.parse_body()
    }

    pub async fn revision(&self) -> Result<String> {
        let req = Request::get(self.path(&["revision"]));
        let resp: RevisionResponse = send(self.db.conn(), req, &[200]).await?.parse_body()?;
        Ok(resp.revision)
    }

    pub async fn checksum(&self, with_revisions: bool, with_data: bool) -> Result<CollectionChecksum> {
        let req = Request::get(self.path(&["checksum"]))
            .with_query("withRevisions", with_revisions)
            .with_query("withData", with_data);
        send(self.db.conn(), req, &[200]).await?.parse_body()
    }

    /// Shard ids mapped to their servers, leader first (cluster only)
    pub async fn shards(&self) -> Result<HashMap<String, Vec<String>>> {
        let req = Request::get(self.path(&["shards"])).with_query("details", true);
        let resp: ShardsResponse = send(self.db.conn(), req, &[200]).await?.parse_body()?;
        Ok(resp.shards)
    }

    /// Load indexes into memory
    pub async fn load(&self) -> Result<()> {
        let req = Request::put(self.path(&["loadIndexesIntoMemory"]));
        send(self.db.conn(), req, &[200]).await?;
        Ok(())
    }

    /// Deprecated on the server side; kept for older deployments
    pub async fn unload(&self) -> Result<()> {
        let req = Request::put(self.path(&["unload"]));
        send(self.db.conn(), req, &[200]).await?;
        Ok(())
    }

    /// Remove all documents, keeping indexes
    pub async fn truncate(&self) -> Result<()> {
        let req = Request::put(self.path(&["truncate"]));
        send(self.db.conn(), req, &[200]).await?;
        Ok(())
    }

    /// Rename the collection and return a handle under the new name
    pub async fn rename(&self, new_name: &str) -> Result<Collection> {
        validate_collection_name(new_name)?;
        let req = Request::put(self.path(&["rename"]))
            .with_json_body(&serde_json::json!({ "name": new_name }))?;
        send(self.db.conn(), req, &[200]).await?;
        Ok(Collection::new(self.db.clone(), new_name))
    }

    /// Drop the collection
    pub async fn remove(&self) -> Result<()> {
        let mut req = Request::delete(self.path(&[]));
        if self.name.starts_with('_') {
            req.set_query("isSystem", true);
        }
        send(self.db.conn(), req, &[200]).await?;
        Ok(())
    }

    /// Fail unless the collection is an edge collection
    pub(crate) async fn ensure_edge_collection(&self) -> Result<()> {
        let props = self.properties().await?;
        if !props.collection_type.is_edge() {
            return Err(ArangoError::invalid_argument(
                format!("collection '{}' is not an edge collection", self.name)
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("database", &self.db.name())
            .field("name", &self.name)
            .finish()
    }
}
