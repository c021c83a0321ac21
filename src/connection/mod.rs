//! Transport layer: requests, responses and the connection trait the
//! client talks through.

pub mod auth;
pub mod http;
pub mod options;
pub mod request;
pub mod response;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use crate::common::error::Result;

pub use auth::Authentication;
pub use http::{HttpConnection, HttpConnectionConfig};
pub use options::{OverwriteMode, RequestOptions, TRANSACTION_ID_HEADER};
pub use request::{HttpMethod, Request};
pub use response::{Response, ASYNC_ID_HEADER};

/// A transport able to execute requests against one or more endpoints
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send a request and return the raw response. Non-2xx statuses are
    /// not errors at this level.
    async fn execute(&self, request: Request) -> Result<Response>;

    /// Endpoints currently in use
    fn endpoints(&self) -> Vec<String>;

    /// Replace the endpoint list
    fn update_endpoints(&self, endpoints: &[String]) -> Result<()>;

    /// Change how subsequent requests authenticate
    fn set_authentication(&self, auth: Authentication) -> Result<()>;
}
