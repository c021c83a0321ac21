// ArangoDB REST client
// Typed async access to the HTTP API plus agency locks

// Common modules
pub mod common {
    pub mod error;
    pub mod document;
    pub mod utils;
    pub mod version;
    pub mod config;
}

// Transport, API surface and agency
pub mod connection;
pub mod client;
pub mod agency;

// Re-export commonly used types for convenience
pub use common::error::{ArangoError, ErrorCode, Result};
pub use common::document::{DocumentId, DocumentMeta};
pub use common::version::{Version, VersionInfo};
pub use common::config::ClientConfig;

pub use connection::{
    Authentication,
    Connection,
    HttpConnection,
    HttpConnectionConfig,
    RequestOptions,
};

pub use client::{Client, Collection, Cursor, Database, Query};
pub use agency::{Agency, Lock};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "arango-rest");
    }
}
