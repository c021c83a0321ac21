use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use crate::client::database::Database;
use crate::client::send;
use crate::common::error::{ArangoError, Result};
use crate::common::utils::path_escape;
use crate::connection::Request;

/// Analyzer as defined on the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerDefinition {
    /// Returned as `<database>::<name>` outside of `_system`
    pub name: String,
    /// `identity`, `text`, `norm`, `ngram`, `pipeline`, ...
    #[serde(rename = "type")]
    pub analyzer_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub properties: Value,
    /// `frequency`, `norm`, `position`, `offset`
    #[serde(default)]
    pub features: Vec<String>,
}

impl AnalyzerDefinition {
    pub fn new(name: impl Into<String>, analyzer_type: impl Into<String>) -> Self {
        AnalyzerDefinition {
            name: name.into(),
            analyzer_type: analyzer_type.into(),
            properties: Value::Null,
            features: Vec::new(),
        }
    }

    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_features<S: AsRef<str>>(mut self, features: &[S]) -> Self {
        self.features = features.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzerList {
    result: Vec<AnalyzerDefinition>,
}

/// Handle to a stored analyzer
#[derive(Debug, Clone)]
pub struct Analyzer {
    db: Database,
    definition: AnalyzerDefinition,
}

impl Analyzer {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Name without the `<database>::` prefix
    pub fn unique_name(&self) -> &str {
        self.definition
            .name
            .split_once("::")
            .map_or(self.definition.name.as_str(), |(_, name)| name)
    }

    pub fn definition(&self) -> &AnalyzerDefinition {
        &self.definition
    }

    /// Delete the analyzer; `force` removes it even while views use it
    pub async fn remove(&self, force: bool) -> Result<()> {
        let escaped = path_escape(self.name());
        let req = Request::delete(self.db.path(&["_api", "analyzer", &escaped])).with_query("force", force);
        send(self.db.conn(), req, &[200]).await?;
        Ok(())
    }
}

impl Database {
    pub async fn analyzers(&self) -> Result<Vec<Analyzer>> {
        let req = Request::get(self.path(&["_api", "analyzer"]));
        let list: AnalyzerList = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(list
            .result
            .into_iter()
            .map(|definition| Analyzer { db: self.clone(), definition })
            .collect())
    }

    pub async fn analyzer(&self, name: &str) -> Result<Analyzer> {
        if name.is_empty() {
            return Err(ArangoError::invalid_argument("analyzer name cannot be empty"));
        }
        let escaped = path_escape(name);
        let req = Request::get(self.path(&["_api", "analyzer", &escaped]));
        let definition = send(self.conn(), req, &[200]).await?.parse_body()?;
        Ok(Analyzer { db: self.clone(), definition })
    }

    /// Create the analyzer if needed. Returns whether an identical analyzer
    /// already existed; a different one with the same name is a conflict.
    pub async fn ensure_analyzer(&self, definition: &AnalyzerDefinition) -> Result<(bool, Analyzer)> {
        let req = Request::post(self.path(&["_api", "analyzer"])).with_json_body(definition)?;
        let resp = send(self.conn(), req, &[200, 201]).await?;
        let existed = resp.status_code == 200;
        let definition: AnalyzerDefinition = resp.parse_body()?;
        debug!(database = %self.name(), analyzer = %definition.name, existed, "ensured analyzer");
        Ok((existed, Analyzer { db: self.clone(), definition }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::connection::mock::{error_response, MockConnection};
    use crate::connection::HttpMethod;

    #[tokio::test]
    async fn test_ensure_analyzer() {
        let conn = MockConnection::new();
        conn.push_json(201, json!({"name": "app::text_de", "type": "text",
            "properties": {"locale": "de", "stemming": true}, "features": ["frequency", "norm"]}));
        conn.push_json(200, json!({"name": "app::text_de", "type": "text",
            "properties": {"locale": "de", "stemming": true}, "features": ["frequency", "norm"]}));
        conn.push(error_response(400, 10, "analyzer 'text_de' already exists with different properties"));
        let db = Database::new(conn.clone(), "app");

        let def = AnalyzerDefinition::new("text_de", "text")
            .with_properties(json!({"locale": "de", "stemming": true}))
            .with_features(&["frequency", "norm"]);
        let (existed, analyzer) = db.ensure_analyzer(&def).await.unwrap();
        assert!(!existed);
        assert_eq!(analyzer.unique_name(), "text_de");
        assert_eq!(conn.last_request().body_json().unwrap()["properties"]["locale"], "de");

        let (existed, _) = db.ensure_analyzer(&def).await.unwrap();
        assert!(existed);

        let err = db.ensure_analyzer(&def.clone().with_features(&["position"])).await.unwrap_err();
        assert_eq!(err.http_code(), Some(400));
    }

    #[tokio::test]
    async fn test_list_and_remove() {
        let conn = MockConnection::new();
        conn.push_json(200, json!({"error": false, "code": 200, "result": [
            {"name": "identity", "type": "identity", "properties": {}, "features": ["frequency", "norm"]},
            {"name": "app::delim", "type": "delimiter", "properties": {"delimiter": ","}, "features": []}
        ]}));
        conn.push_json(200, json!({"error": false, "code": 200, "name": "app::delim"}));
        let db = Database::new(conn.clone(), "app");

        let analyzers = db.analyzers().await.unwrap();
        assert_eq!(analyzers.len(), 2);
        assert_eq!(analyzers[0].unique_name(), "identity");

        analyzers[1].remove(true).await.unwrap();
        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::DELETE);
        assert_eq!(req.path, "/_db/app/_api/analyzer/app%3A%3Adelim");
        assert_eq!(req.query_param("force"), Some("true"));
    }

    #[tokio::test]
    async fn test_analyzer_not_found() {
        let conn = MockConnection::new();
        conn.push(error_response(404, 1202, "analyzer not found"));
        let db = Database::new(conn.clone(), "app");
        assert!(db.analyzer("nope").await.unwrap_err().is_not_found());
        assert!(db.analyzer("").await.unwrap_err().is_invalid_argument());
    }
}
