use std::collections::HashMap;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use crate::common::error::{ArangoError, ResponseError, Result};

/// Header carrying the id of a request stored as an async job
pub const ASYNC_ID_HEADER: &str = "x-arango-async-id";

/// A response as returned by a [`Connection`](super::Connection)
#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    /// Header names are stored lowercase
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    /// Endpoint that served the request
    pub endpoint: String,
}

impl Response {
    pub fn new(status_code: u16) -> Self {
        Response {
            status_code,
            headers: HashMap::new(),
            body: Bytes::new(),
            endpoint: String::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json_body<T: Serialize + ?Sized>(mut self, data: &T) -> Result<Self> {
        self.body = Bytes::from(serde_json::to_vec(data)?);
        self.headers.insert("content-type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn body_as_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Succeed if the status is one of `expected`, otherwise turn the
    /// response into an error.
    pub fn check_status(&self, expected: &[u16]) -> Result<()> {
        if expected.contains(&self.status_code) {
            return Ok(());
        }
        Err(self.as_error())
    }

    /// Build the error for an unexpected response
    pub fn as_error(&self) -> ArangoError {
        if self.status_code == 202 {
            if let Some(job_id) = self.header(ASYNC_ID_HEADER) {
                return ArangoError::AsyncJobInProgress { job_id: job_id.to_string() };
            }
        }

        match serde_json::from_slice::<Value>(&self.body) {
            Ok(value) if value.get("error").and_then(Value::as_bool) == Some(true) => {
                match serde_json::from_value::<ResponseError>(value) {
                    Ok(mut err) => {
                        if err.code == 0 {
                            err.code = self.status_code;
                        }
                        ArangoError::Response(err)
                    }
                    Err(_) => self.plain_error(),
                }
            }
            _ => self.plain_error(),
        }
    }

    fn plain_error(&self) -> ArangoError {
        let mut message = self.body_as_string();
        if message.len() > 512 {
            let mut end = 512;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        ArangoError::response(self.status_code, 0, message)
    }

    /// Decode the whole body
    pub fn parse_body<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Decode a single field of the envelope, e.g. `result` or `graph`
    pub fn parse_field<T: DeserializeOwned>(&self, field: &str) -> Result<T> {
        let mut value: Value = self.parse_body()?;
        let inner = value
            .get_mut(field)
            .map(Value::take)
            .ok_or_else(|| ArangoError::transport(format!("response has no '{}' field", field)))?;
        Ok(serde_json::from_value(inner)?)
    }

    /// Decode a JSON array whose elements are either values or error objects
    pub fn parse_array_body<T: DeserializeOwned>(&self) -> Result<Vec<Result<T>>> {
        let items: Vec<Value> = self.parse_body()?;
        Ok(items.into_iter().map(|item| parse_array_item(item, self.status_code)).collect())
    }
}

fn parse_array_item<T: DeserializeOwned>(item: Value, status_code: u16) -> Result<T> {
    if item.get("error").and_then(Value::as_bool) == Some(true) {
        let mut err: ResponseError = serde_json::from_value(item)?;
        if err.code == 0 {
            err.code = error_num_to_http_code(err.error_num).unwrap_or(status_code);
        }
        return Err(ArangoError::Response(err));
    }
    Ok(serde_json::from_value(item)?)
}

/// Multi-document responses carry only `errorNum` per element
fn error_num_to_http_code(error_num: u32) -> Option<u16> {
    match error_num {
        1202 | 1203 => Some(404),
        1200 => Some(412),
        1210 => Some(409),
        1205 | 1221 | 1222 | 1226 | 1227 | 1233 | 1239 => Some(400),
        _ => None,
    }
}
