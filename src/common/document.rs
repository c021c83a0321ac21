use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use crate::common::error::{ArangoError, Result};

/// Characters besides ASCII letters and digits allowed in a document key
const KEY_PUNCTUATION: &str = "_-:.@()+,=;$!*'%";

/// Maximum length of a document key in bytes
pub const MAX_KEY_LENGTH: usize = 254;

/// Validate a document key before it is put into a URL
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ArangoError::invalid_argument("document key cannot be empty"));
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(ArangoError::invalid_argument(
            format!("document key too long (max {} bytes)", MAX_KEY_LENGTH)
        ));
    }

    if let Some(c) = key.chars().find(|c| !c.is_ascii_alphanumeric() && !KEY_PUNCTUATION.contains(*c)) {
        return Err(ArangoError::invalid_argument(
            format!("invalid character '{}' in document key", c)
        ));
    }

    Ok(())
}

/// Document ID - combination of collection name and document key
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId {
    collection: String,
    key: String,
}

impl DocumentId {
    /// Create a new document ID
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        DocumentId {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Parse document ID from string format "collection/key"
    pub fn parse(id: &str) -> Result<Self> {
        match id.split_once('/') {
            Some((collection, key)) if !collection.is_empty() && !key.is_empty() && !key.contains('/') => {
                Ok(DocumentId::new(collection, key))
            }
            _ => Err(ArangoError::invalid_argument(
                format!("document ID '{}' must be in format 'collection/key'", id)
            )),
        }
    }

    /// Get collection name
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Get document key
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty() && self.key.is_empty()
    }
}

impl FromStr for DocumentId {
    type Err = ArangoError;

    fn from_str(s: &str) -> Result<Self> {
        DocumentId::parse(s)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

impl Serialize for DocumentId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(DocumentId::default());
        }
        DocumentId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Metadata the server attaches to every stored document.
///
/// All fields are empty when the server was asked to stay silent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMeta {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_oldRev", skip_serializing_if = "Option::is_none")]
    pub old_rev: Option<String>,
}

impl DocumentMeta {
    /// Extract the metadata fields of a document body
    pub fn from_document(document: &Value) -> Result<Self> {
        let obj = document.as_object().ok_or_else(|| {
            ArangoError::invalid_argument("document is not a JSON object")
        })?;
        let field = |name: &str| obj.get(name).and_then(Value::as_str).map(str::to_string);

        let id = match field("_id") {
            Some(id) => DocumentId::parse(&id)?,
            None => return Err(ArangoError::invalid_argument("document has no _id")),
        };
        Ok(DocumentMeta {
            key: field("_key").unwrap_or_else(|| id.key().to_string()),
            id,
            rev: field("_rev").unwrap_or_default(),
            old_rev: field("_oldRev"),
        })
    }
}

/// Result of a write operation on a single document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResponse {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    /// Previous document body (requires `return_old`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    /// New document body (requires `return_new`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
}

impl DocumentResponse {
    pub fn key(&self) -> &str {
        &self.meta.key
    }

    pub fn rev(&self) -> &str {
        &self.meta.rev
    }

    /// Deserialize the returned new document
    pub fn new_as<T: serde::de::DeserializeOwned>(&self) -> Result<Option<T>> {
        self.new.clone().map(serde_json::from_value).transpose().map_err(Into::into)
    }

    /// Deserialize the returned old document
    pub fn old_as<T: serde::de::DeserializeOwned>(&self) -> Result<Option<T>> {
        self.old.clone().map(serde_json::from_value).transpose().map_err(Into::into)
    }
}

/// Edge direction used by the edges endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    Any,
    In,
    Out,
}

impl EdgeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeDirection::Any => "any",
            EdgeDirection::In => "in",
            EdgeDirection::Out => "out",
        }
    }

    pub fn reverse(&self) -> Self {
        match self {
            EdgeDirection::In => EdgeDirection::Out,
            EdgeDirection::Out => EdgeDirection::In,
            EdgeDirection::Any => EdgeDirection::Any,
        }
    }
}

impl Default for EdgeDirection {
    fn default() -> Self {
        EdgeDirection::Any
    }
}

impl fmt::Display for EdgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An edge document as returned by the edges endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDocument {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    #[serde(rename = "_from")]
    pub from: DocumentId,
    #[serde(rename = "_to")]
    pub to: DocumentId,
    /// Remaining user attributes
    #[serde(flatten)]
    pub data: serde_json::Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("abc-123_x").is_ok());
        assert!(validate_key("_system:users(1)").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("sp ace").is_err());
        assert!(validate_key(&"k".repeat(255)).is_err());
    }

    #[test]
    fn test_document_id() {
        let id = DocumentId::parse("users/alice").unwrap();
        assert_eq!(id.collection(), "users");
        assert_eq!(id.key(), "alice");
        assert_eq!(id.to_string(), "users/alice");
        assert!(DocumentId::parse("users").is_err());
        assert!(DocumentId::parse("/alice").is_err());
        assert!(DocumentId::parse("a/b/c").is_err());

        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, json!("users/alice"));
    }

    #[test]
    fn test_meta_from_document() {
        let doc = json!({"_key": "1", "_id": "c/1", "_rev": "_abc", "name": "x"});
        let meta = DocumentMeta::from_document(&doc).unwrap();
        assert_eq!(meta.key, "1");
        assert_eq!(meta.id.collection(), "c");
        assert_eq!(meta.rev, "_abc");
        assert!(meta.old_rev.is_none());

        assert!(DocumentMeta::from_document(&json!({"name": "x"})).is_err());
        assert!(DocumentMeta::from_document(&json!([1])).is_err());
    }

    #[test]
    fn test_document_response_with_new() {
        let body = json!({
            "_key": "1", "_id": "c/1", "_rev": "_b", "_oldRev": "_a",
            "new": {"_key": "1", "value": 5}
        });
        let resp: DocumentResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.key(), "1");
        assert_eq!(resp.meta.old_rev.as_deref(), Some("_a"));
        let new: Option<Value> = resp.new_as().unwrap();
        assert_eq!(new.unwrap()["value"], 5);
        assert!(resp.old.is_none());
    }

    #[test]
    fn test_edge_document() {
        let body = json!({"_key": "e", "_id": "knows/e", "_rev": "1", "_from": "p/a", "_to": "p/b", "since": 2020});
        let edge: EdgeDocument = serde_json::from_value(body).unwrap();
        assert_eq!(edge.from.key(), "a");
        assert_eq!(edge.to.key(), "b");
        assert_eq!(edge.data["since"], 2020);
        assert_eq!(EdgeDirection::In.reverse(), EdgeDirection::Out);
    }
}
