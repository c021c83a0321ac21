use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::client::database::Database;
use crate::client::send;
use crate::common::error::{ArangoError, Result};
use crate::common::utils::{path_escape, require_non_empty};
use crate::connection::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewType {
    #[serde(rename = "arangosearch")]
    ArangoSearch,
    #[serde(rename = "search-alias")]
    SearchAlias,
}

impl ViewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewType::ArangoSearch => "arangosearch",
            ViewType::SearchAlias => "search-alias",
        }
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub view_type: ViewType,
    #[serde(default)]
    pub globally_unique_id: String,
}

/// How a collection is linked into an arangosearch view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArangoSearchLink {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analyzers: Vec<String>,
    /// Per-attribute overrides, nested the same way
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, ArangoSearchLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_all_fields: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_list_positions: Option<bool>,
    /// `none` or `id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_values: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_background: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimarySortField {
    pub field: String,
    #[serde(default = "default_true")]
    pub asc: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArangoSearchViewProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_interval_step: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_interval_msec: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidation_interval_msec: Option<u64>,
    /// `tier` or `bytes_accum` policy object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidation_policy: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writebuffer_idle: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writebuffer_active: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writebuffer_size_max: Option<u64>,
    /// Immutable after creation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_sort: Vec<PrimarySortField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_sort_compression: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stored_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub links: HashMap<String, ArangoSearchLink>,
}

impl ArangoSearchViewProperties {
    pub fn with_link(mut self, collection: impl Into<String>, link: ArangoSearchLink) -> Self {
        self.links.insert(collection.into(), link);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchAliasIndex {
    pub collection: String,
    /// Name of an inverted index of the collection
    pub index: String,
    /// `add` or `del`, only used when updating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

impl SearchAliasIndex {
    pub fn new(collection: impl Into<String>, index: impl Into<String>) -> Self {
        SearchAliasIndex {
            collection: collection.into(),
            index: index.into(),
            operation: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchAliasViewProperties {
    #[serde(default)]
    pub indexes: Vec<SearchAliasIndex>,
}

/// Properties of either kind of view, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ViewProperties {
    #[serde(rename = "arangosearch")]
    ArangoSearch(ArangoSearchViewProperties),
    #[serde(rename = "search-alias")]
    SearchAlias(SearchAliasViewProperties),
}

impl ViewProperties {
    pub fn view_type(&self) -> ViewType {
        match self {
            ViewProperties::ArangoSearch(_) => ViewType::ArangoSearch,
            ViewProperties::SearchAlias(_) => ViewType::SearchAlias,
        }
    }

    fn untagged_body(&self) -> Result<Value> {
        Ok(match self {
            ViewProperties::ArangoSearch(props) => serde_json::to_value(props)?,
            ViewProperties::SearchAlias(props) => serde_json::to_value(props)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct CreateViewRequest<'a> {
    name: &'a str,
    #[serde(flatten)]
    properties: &'a ViewProperties,
}

#[derive(Debug, Deserialize)]
struct ViewList {
    result: Vec<ViewInfo>,
}

/// Handle to an arangosearch or search-alias view
#[derive(Clone)]
pub struct View {
    db: Database,
    name: String,
    view_type: ViewType,
}

impl Database {
    pub async fn views(&self) -> Result<Vec<View>> {
        let req = Request::get(self.path(&["_api", "view"]));
        let list: ViewList = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(list
            .result
            .into_iter()
            .map(|info| View::new(self.clone(), &info.name, info.view_type))
            .collect())
    }

    pub async fn view(&self, name: &str) -> Result<View> {
        require_non_empty(name, "view name")?;
        let escaped = path_escape(name);
        let req = Request::get(self.path(&["_api", "view", &escaped]));
        let info: ViewInfo = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(View::new(self.clone(), &info.name, info.view_type))
    }

    pub async fn view_exists(&self, name: &str) -> Result<bool> {
        match self.view(name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_view(&self, name: &str, properties: &ViewProperties) -> Result<View> {
        if name.is_empty() {
            return Err(ArangoError::invalid_argument("view name cannot be empty"));
        }
        let req = Request::post(self.path(&["_api", "view"]))
            .with_json_body(&CreateViewRequest { name, properties })?;
        send(self.conn(), req, &[201]).await?;
        Ok(View::new(self.clone(), name, properties.view_type()))
    }

    pub async fn create_arangosearch_view(&self, name: &str, properties: &ArangoSearchViewProperties) -> Result<View> {
        self.create_view(name, &ViewProperties::ArangoSearch(properties.clone())).await
    }

    pub async fn create_search_alias_view(&self, name: &str, properties: &SearchAliasViewProperties) -> Result<View> {
        self.create_view(name, &ViewProperties::SearchAlias(properties.clone())).await
    }
}

impl View {
    fn new(db: Database, name: &str, view_type: ViewType) -> Self {
        View {
            db,
            name: name.to_string(),
            view_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view_type(&self) -> ViewType {
        self.view_type
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn path(&self, parts: &[&str]) -> String {
        let escaped = path_escape(&self.name);
        let mut all = vec!["_api", "view", escaped.as_str()];
        all.extend_from_slice(parts);
        self.db.path(&all)
    }

    pub async fn properties(&self) -> Result<ViewProperties> {
        let req = Request::get(self.path(&["properties"]));
        send(self.db.conn(), req, &[200]).await?.parse_body()
    }

    fn check_type(&self, properties: &ViewProperties) -> Result<()> {
        if properties.view_type() != self.view_type {
            return Err(ArangoError::invalid_argument(format!(
                "view '{}' is of type {}, got {} properties",
                self.name, self.view_type, properties.view_type()
            )));
        }
        Ok(())
    }

    /// Replace all mutable properties
    pub async fn set_properties(&self, properties: &ViewProperties) -> Result<ViewProperties> {
        self.check_type(properties)?;
        let req = Request::put(self.path(&["properties"])).with_json_body(&properties.untagged_body()?)?;
        send(self.db.conn(), req, &[200]).await?.parse_body()
    }

    /// Change only the given properties
    pub async fn update_properties(&self, properties: &ViewProperties) -> Result<ViewProperties> {
        self.check_type(properties)?;
        let req = Request::patch(self.path(&["properties"])).with_json_body(&properties.untagged_body()?)?;
        send(self.db.conn(), req, &[200]).await?.parse_body()
    }

    /// Rename the view (single server only)
    pub async fn rename(&self, new_name: &str) -> Result<View> {
        if new_name.is_empty() {
            return Err(ArangoError::invalid_argument("view name cannot be empty"));
        }
        let req = Request::put(self.path(&["rename"])).with_json_body(&serde_json::json!({ "name": new_name }))?;
        send(self.db.conn(), req, &[200]).await?;
        Ok(View::new(self.db.clone(), new_name, self.view_type))
    }

    pub async fn remove(&self) -> Result<()> {
        let req = Request::delete(self.path(&[]));
        send(self.db.conn(), req, &[200]).await?;
        Ok(())
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("database", &self.db.name())
            .field("name", &self.name)
            .field("type", &self.view_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::connection::mock::{error_response, MockConnection};
    use crate::connection::HttpMethod;

    #[tokio::test]
    async fn test_empty_view_name_rejected() {
        let conn = MockConnection::new();
        let db = Database::new(conn.clone(), "app");
        assert!(db.view("").await.unwrap_err().is_invalid_argument());
        assert!(db.view_exists("").await.unwrap_err().is_invalid_argument());
        assert_eq!(conn.request_count(), 0);
    }

    #[tokio::test]
    async fn test_create_arangosearch_view() {
        let conn = MockConnection::new();
        conn.push_json(201, json!({"id": "1", "name": "products", "type": "arangosearch", "links": {}}));
        let db = Database::new(conn.clone(), "app");

        let link = ArangoSearchLink {
            analyzers: vec!["text_en".into()],
            include_all_fields: Some(true),
            ..Default::default()
        };
        let props = ArangoSearchViewProperties {
            commit_interval_msec: Some(500),
            ..Default::default()
        }
        .with_link("items", link);
        let view = db.create_arangosearch_view("products", &props).await.unwrap();
        assert_eq!(view.view_type(), ViewType::ArangoSearch);

        let body = conn.last_request().body_json().unwrap();
        assert_eq!(body["name"], "products");
        assert_eq!(body["type"], "arangosearch");
        assert_eq!(body["commitIntervalMsec"], 500);
        assert_eq!(body["links"]["items"]["analyzers"], json!(["text_en"]));
        assert!(body["links"]["items"].get("fields").is_none());
    }

    #[tokio::test]
    async fn test_search_alias_properties() {
        let conn = MockConnection::new();
        conn.push_json(200, json!({"id": "2", "name": "alias", "type": "search-alias", "globallyUniqueId": "h1",
            "indexes": [{"collection": "items", "index": "inv"}]}));
        conn.push_json(200, json!({"id": "2", "name": "alias", "type": "search-alias",
            "indexes": [{"collection": "items", "index": "inv"}, {"collection": "docs", "index": "inv2"}]}));
        let view = View::new(Database::new(conn.clone(), "app"), "alias", ViewType::SearchAlias);

        match view.properties().await.unwrap() {
            ViewProperties::SearchAlias(props) => assert_eq!(props.indexes[0].index, "inv"),
            other => panic!("unexpected properties {:?}", other),
        }

        let mut add = SearchAliasIndex::new("docs", "inv2");
        add.operation = Some("add".into());
        let update = ViewProperties::SearchAlias(SearchAliasViewProperties { indexes: vec![add] });
        view.update_properties(&update).await.unwrap();
        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::PATCH);
        assert_eq!(req.body_json().unwrap(), json!({"indexes": [{"collection": "docs", "index": "inv2", "operation": "add"}]}));

        let wrong = ViewProperties::ArangoSearch(Default::default());
        assert!(view.set_properties(&wrong).await.unwrap_err().is_invalid_argument());
    }

    #[tokio::test]
    async fn test_views_and_exists() {
        let conn = MockConnection::new();
        conn.push_json(200, json!({"error": false, "code": 200, "result": [
            {"id": "1", "name": "a", "type": "arangosearch", "globallyUniqueId": "x"},
            {"id": "2", "name": "b", "type": "search-alias", "globallyUniqueId": "y"}
        ]}));
        conn.push(error_response(404, 1203, "view not found"));
        let db = Database::new(conn.clone(), "app");

        let views = db.views().await.unwrap();
        assert_eq!(views[1].view_type(), ViewType::SearchAlias);
        assert!(!db.view_exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_and_remove() {
        let conn = MockConnection::new();
        conn.push_json(200, json!({"id": "1", "name": "new", "type": "arangosearch"}));
        conn.push_json(200, json!({"error": false, "code": 200, "result": true}));
        let view = View::new(Database::new(conn.clone(), "app"), "old", ViewType::ArangoSearch);

        let renamed = view.rename("new").await.unwrap();
        assert_eq!(renamed.name(), "new");
        assert_eq!(conn.last_request().path, "/_db/app/_api/view/old/rename");

        renamed.remove().await.unwrap();
        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::DELETE);
        assert_eq!(req.path, "/_db/app/_api/view/new");
    }
}
