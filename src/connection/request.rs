use std::collections::HashMap;
use bytes::Bytes;
use serde::Serialize;
use url::Url;
use crate::common::error::{ArangoError, Result};

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::GET => reqwest::Method::GET,
            HttpMethod::POST => reqwest::Method::POST,
            HttpMethod::PUT => reqwest::Method::PUT,
            HttpMethod::DELETE => reqwest::Method::DELETE,
            HttpMethod::PATCH => reqwest::Method::PATCH,
            HttpMethod::HEAD => reqwest::Method::HEAD,
            HttpMethod::OPTIONS => reqwest::Method::OPTIONS,
        }
    }
}

/// A request against the server, relative to an endpoint
#[derive(Debug, Clone)]
pub struct Request {
    pub method: HttpMethod,
    /// Escaped path, e.g. `/_db/_system/_api/version`
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Header names are stored lowercase
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
}

impl Request {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Request {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::DELETE, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::HEAD, path)
    }

    /// Set a query parameter, replacing an existing value for the same key
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set_query(key, value);
        self
    }

    pub fn set_query(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.query.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.query.push((key, value)),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into().to_ascii_lowercase(), value.into());
    }

    pub fn with_json_body<T: Serialize + ?Sized>(mut self, data: &T) -> Result<Self> {
        let json = serde_json::to_vec(data)?;
        self.body = Some(Bytes::from(json));
        self.set_header("content-type", "application/json");
        Ok(self)
    }

    pub fn with_raw_body(mut self, body: impl Into<Bytes>, content_type: &str) -> Self {
        self.body = Some(body.into());
        self.set_header("content-type", content_type);
        self
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    /// Decode the body as JSON
    pub fn body_json(&self) -> Result<serde_json::Value> {
        match &self.body {
            Some(body) => Ok(serde_json::from_slice(body)?),
            None => Err(ArangoError::invalid_argument("request has no body")),
        }
    }

    /// Resolve against an endpoint such as `http://localhost:8529`
    pub fn url(&self, endpoint: &Url) -> Result<Url> {
        let base = endpoint.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{}{}", base, self.path))?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        Ok(url)
    }
}
