use std::fmt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use crate::client::collection::ReplicationFactor;
use crate::client::database::Database;
use crate::client::send;
use crate::common::document::{validate_key, DocumentMeta, DocumentResponse};
use crate::common::error::{ArangoError, Result};
use crate::common::utils::{path_escape, require_non_empty, validate_collection_name};
use crate::connection::{Request, RequestOptions};

/// Edge definition in a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    /// Edge collection name
    pub collection: String,
    /// Source vertex collections
    pub from: Vec<String>,
    /// Target vertex collections
    pub to: Vec<String>,
}

impl EdgeDefinition {
    pub fn new<S: AsRef<str>>(collection: impl Into<String>, from: &[S], to: &[S]) -> Self {
        EdgeDefinition {
            collection: collection.into(),
            from: from.iter().map(|s| s.as_ref().to_string()).collect(),
            to: to.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }
}

/// Graph description as stored by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphInfo {
    /// Graph name
    pub name: String,
    #[serde(rename = "_key", default)]
    pub key: String,
    #[serde(rename = "_rev", default)]
    pub rev: String,
    #[serde(default)]
    pub edge_definitions: Vec<EdgeDefinition>,
    /// Vertex collections not used in any edge definition
    #[serde(default)]
    pub orphan_collections: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_shards: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<ReplicationFactor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_concern: Option<u32>,
    #[serde(default)]
    pub is_smart: bool,
    #[serde(default)]
    pub is_disjoint: bool,
    #[serde(default)]
    pub is_satellite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_graph_attribute: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphCreateSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_graph_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_shards: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<ReplicationFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_concern: Option<u32>,
    /// Collections created as satellites in hybrid smart graphs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub satellites: Vec<String>,
}

impl GraphCreateSettings {
    fn is_empty(&self) -> bool {
        *self == GraphCreateSettings::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGraphOptions {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub edge_definitions: Vec<EdgeDefinition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub orphan_collections: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_smart: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_disjoint: Option<bool>,
    #[serde(skip_serializing_if = "GraphCreateSettings::is_empty")]
    pub options: GraphCreateSettings,
    #[serde(skip)]
    pub wait_for_sync: bool,
}

impl CreateGraphOptions {
    pub fn with_edge_definition(mut self, definition: EdgeDefinition) -> Self {
        self.edge_definitions.push(definition);
        self
    }

    pub fn with_orphan_collection(mut self, name: impl Into<String>) -> Self {
        self.orphan_collections.push(name.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct CreateGraphRequest<'a> {
    name: &'a str,
    #[serde(flatten)]
    options: &'a CreateGraphOptions,
}

#[derive(Debug, Deserialize)]
struct GraphEnvelope {
    graph: GraphInfo,
}

#[derive(Debug, Deserialize)]
struct GraphList {
    graphs: Vec<GraphInfo>,
}

#[derive(Debug, Deserialize)]
struct CollectionList {
    collections: Vec<String>,
}

/// Write responses wrap the metadata in `vertex` or `edge`
#[derive(Debug, Deserialize)]
struct ElementResponse {
    #[serde(default, alias = "edge")]
    vertex: DocumentMeta,
    #[serde(default)]
    old: Option<Value>,
    #[serde(default)]
    new: Option<Value>,
}

impl From<ElementResponse> for DocumentResponse {
    fn from(resp: ElementResponse) -> Self {
        DocumentResponse {
            meta: resp.vertex,
            old: resp.old,
            new: resp.new,
        }
    }
}

/// Handle to a named graph
#[derive(Clone)]
pub struct Graph {
    db: Database,
    name: String,
}

impl Database {
    fn gharial_path(&self, parts: &[&str]) -> String {
        let mut all = vec!["_api", "gharial"];
        all.extend_from_slice(parts);
        self.path(&all)
    }

    pub async fn graphs(&self) -> Result<Vec<GraphInfo>> {
        let req = Request::get(self.gharial_path(&[]));
        let list: GraphList = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(list.graphs)
    }

    /// Handle to an existing graph
    pub async fn graph(&self, name: &str) -> Result<Graph> {
        require_non_empty(name, "graph name")?;
        let graph = Graph::new(self.clone(), name);
        graph.info().await?;
        Ok(graph)
    }

    pub async fn graph_exists(&self, name: &str) -> Result<bool> {
        match self.graph(name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn create_graph(&self, name: &str, options: &CreateGraphOptions) -> Result<Graph> {
        if name.is_empty() {
            return Err(ArangoError::invalid_argument("graph name cannot be empty"));
        }
        let mut req = Request::post(self.gharial_path(&[])).with_json_body(&CreateGraphRequest { name, options })?;
        if options.wait_for_sync {
            req.set_query("waitForSync", true);
        }
        send(self.conn(), req, &[201, 202]).await?;
        debug!(database = %self.name(), graph = %name, "created graph");
        Ok(Graph::new(self.clone(), name))
    }
}

impl Graph {
    pub(crate) fn new(db: Database, name: &str) -> Self {
        Graph {
            db,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// `/_db/<db>/_api/gharial/<graph>/<parts...>`
    fn path(&self, parts: &[&str]) -> String {
        let escaped = path_escape(&self.name);
        let mut all = vec![escaped.as_str()];
        all.extend_from_slice(parts);
        self.db.gharial_path(&all)
    }

    pub async fn info(&self) -> Result<GraphInfo> {
        let req = Request::get(self.path(&[]));
        let envelope: GraphEnvelope = send(self.db.conn(), req, &[200]).await?.parse_body()?;
        Ok(envelope.graph)
    }

    /// Delete the graph, optionally dropping collections no other graph uses
    pub async fn remove(&self, drop_collections: bool) -> Result<()> {
        let req = Request::delete(self.path(&[])).with_query("dropCollections", drop_collections);
        send(self.db.conn(), req, &[200, 201, 202]).await?;
        Ok(())
    }

    pub async fn edge_definitions(&self) -> Result<Vec<EdgeDefinition>> {
        Ok(self.info().await?.edge_definitions)
    }

    /// Names of the edge collections
    pub async fn edge_collections(&self) -> Result<Vec<String>> {
        let req = Request::get(self.path(&["edge"]));
        let list: CollectionList = send(self.db.conn(), req, &[200]).await?.parse_body()?;
        Ok(list.collections)
    }

    pub async fn add_edge_definition(&self, definition: &EdgeDefinition) -> Result<GraphInfo> {
        validate_collection_name(&definition.collection)?;
        let req = Request::post(self.path(&["edge"])).with_json_body(definition)?;
        let envelope: GraphEnvelope = send(self.db.conn(), req, &[201, 202]).await?.parse_body()?;
        Ok(envelope.graph)
    }

    pub async fn replace_edge_definition(&self, definition: &EdgeDefinition) -> Result<GraphInfo> {
        validate_collection_name(&definition.collection)?;
        let escaped = path_escape(&definition.collection);
        let req = Request::put(self.path(&["edge", &escaped])).with_json_body(definition)?;
        let envelope: GraphEnvelope = send(self.db.conn(), req, &[201, 202]).await?.parse_body()?;
        Ok(envelope.graph)
    }

    pub async fn remove_edge_definition(&self, collection: &str, drop_collection: bool) -> Result<GraphInfo> {
        validate_collection_name(collection)?;
        let escaped = path_escape(collection);
        let req = Request::delete(self.path(&["edge", &escaped])).with_query("dropCollections", drop_collection);
        let envelope: GraphEnvelope = send(self.db.conn(), req, &[201, 202]).await?.parse_body()?;
        Ok(envelope.graph)
    }

    /// Vertex collections, orphans included
    pub async fn vertex_collections(&self) -> Result<Vec<String>> {
        let req = Request::get(self.path(&["vertex"]));
        let list: CollectionList = send(self.db.conn(), req, &[200]).await?.parse_body()?;
        Ok(list.collections)
    }

    /// Add an orphan vertex collection
    pub async fn add_vertex_collection(&self, name: &str) -> Result<GraphInfo> {
        validate_collection_name(name)?;
        let req = Request::post(self.path(&["vertex"])).with_json_body(&serde_json::json!({ "collection": name }))?;
        let envelope: GraphEnvelope = send(self.db.conn(), req, &[201, 202]).await?.parse_body()?;
        Ok(envelope.graph)
    }

    pub async fn remove_vertex_collection(&self, name: &str, drop_collection: bool) -> Result<GraphInfo> {
        validate_collection_name(name)?;
        let escaped = path_escape(name);
        let req = Request::delete(self.path(&["vertex", &escaped])).with_query("dropCollection", drop_collection);
        let envelope: GraphEnvelope = send(self.db.conn(), req, &[200, 202]).await?.parse_body()?;
        Ok(envelope.graph)
    }

    pub fn vertex_collection(&self, name: &str) -> Result<GraphCollection> {
        validate_collection_name(name)?;
        Ok(GraphCollection::new(self.clone(), name, ElementKind::Vertex))
    }

    pub fn edge_collection(&self, name: &str) -> Result<GraphCollection> {
        validate_collection_name(name)?;
        Ok(GraphCollection::new(self.clone(), name, ElementKind::Edge))
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("database", &self.db.name())
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Vertex,
    Edge,
}

impl ElementKind {
    fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Vertex => "vertex",
            ElementKind::Edge => "edge",
        }
    }
}

/// Vertex or edge collection accessed through the graph API, which keeps
/// edges consistent with the graph's definitions.
#[derive(Debug, Clone)]
pub struct GraphCollection {
    graph: Graph,
    name: String,
    kind: ElementKind,
}

impl GraphCollection {
    fn new(graph: Graph, name: &str, kind: ElementKind) -> Self {
        GraphCollection {
            graph,
            name: name.to_string(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn is_edge(&self) -> bool {
        self.kind == ElementKind::Edge
    }

    fn path(&self, key: Option<&str>) -> String {
        let collection = path_escape(&self.name);
        match key {
            Some(key) => {
                let key = path_escape(key);
                self.graph.path(&[self.kind.as_str(), &collection, &key])
            }
            None => self.graph.path(&[self.kind.as_str(), &collection]),
        }
    }

    pub async fn read<T: DeserializeOwned>(&self, key: &str, options: &RequestOptions) -> Result<(T, DocumentMeta)> {
        validate_key(key)?;
        let req = options.apply(Request::get(self.path(Some(key))));
        let document = send(self.graph.db.conn(), req, &[200]).await?.parse_field::<Value>(self.kind.as_str())?;
        let meta = DocumentMeta::from_document(&document)?;
        Ok((serde_json::from_value(document)?, meta))
    }

    /// Insert a vertex, or an edge carrying `_from` and `_to`
    pub async fn create<D: Serialize + ?Sized>(&self, document: &D, options: &RequestOptions) -> Result<DocumentResponse> {
        let req = options.apply(Request::post(self.path(None))).with_json_body(document)?;
        let resp: ElementResponse = send(self.graph.db.conn(), req, &[201, 202]).await?.parse_body()?;
        Ok(resp.into())
    }

    pub async fn update<D: Serialize + ?Sized>(&self, key: &str, patch: &D, options: &RequestOptions) -> Result<DocumentResponse> {
        validate_key(key)?;
        let req = options.apply(Request::patch(self.path(Some(key)))).with_json_body(patch)?;
        let resp: ElementResponse = send(self.graph.db.conn(), req, &[200, 201, 202]).await?.parse_body()?;
        Ok(resp.into())
    }

    pub async fn replace<D: Serialize + ?Sized>(&self, key: &str, document: &D, options: &RequestOptions) -> Result<DocumentResponse> {
        validate_key(key)?;
        let req = options.apply(Request::put(self.path(Some(key)))).with_json_body(document)?;
        let resp: ElementResponse = send(self.graph.db.conn(), req, &[200, 201, 202]).await?.parse_body()?;
        Ok(resp.into())
    }

    /// Remove the element; removing a vertex also removes its edges
    pub async fn remove(&self, key: &str, options: &RequestOptions) -> Result<DocumentResponse> {
        validate_key(key)?;
        let req = options.apply(Request::delete(self.path(Some(key))));
        let resp: ElementResponse = send(self.graph.db.conn(), req, &[200, 202]).await?.parse_body()?;
        Ok(resp.into())
    }
}
