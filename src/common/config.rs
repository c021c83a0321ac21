//! Client configuration: built-in defaults, an optional TOML file and
//! `ARANGO_*` environment overrides, in that order of precedence.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use crate::client::Client;
use crate::common::error::{ArangoError, Result};
use crate::connection::{Authentication, HttpConnection, HttpConnectionConfig};

const ENV_PREFIX: &str = "ARANGO";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoints: Vec<String>,
    /// One of `none`, `basic`, `jwt` or `raw`
    pub authentication: String,
    pub username: String,
    pub password: String,
    /// Token sent as bearer when `authentication` is `raw`
    pub jwt: Option<String>,
    pub database: String,
    pub timeout_secs: u64,
    pub accept_invalid_certs: bool,
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoints: vec!["http://localhost:8529".to_string()],
            authentication: "none".to_string(),
            username: "root".to_string(),
            password: String::new(),
            jwt: None,
            database: "_system".to_string(),
            timeout_secs: 60,
            accept_invalid_certs: false,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Load from `path` (if given) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Same as `load`, reading overrides from `env` instead of the process
    /// environment when it is set
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let defaults = ClientConfig::default();
        let mut builder = Config::builder()
            .set_default("endpoints", defaults.endpoints.clone())?
            .set_default("authentication", defaults.authentication.clone())?
            .set_default("username", defaults.username.clone())?
            .set_default("password", defaults.password.clone())?
            .set_default("database", defaults.database.clone())?
            .set_default("timeout_secs", defaults.timeout_secs)?
            .set_default("accept_invalid_certs", defaults.accept_invalid_certs)?;

        if let Some(path) = path {
            if !path.exists() {
                return Err(ArangoError::Config(format!("config file {} not found", path.display())));
            }
            debug!(path = %path.display(), "loading client config");
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("endpoints")
                .source(env),
        );

        let config: ClientConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(ArangoError::Config("at least one endpoint is required".to_string()));
        }
        for endpoint in &self.endpoints {
            let url = Url::parse(endpoint)
                .map_err(|e| ArangoError::Config(format!("invalid endpoint '{}': {}", endpoint, e)))?;
            if !matches!(url.scheme(), "http" | "https" | "tcp" | "ssl") {
                return Err(ArangoError::Config(format!("unsupported endpoint scheme in '{}'", endpoint)));
            }
        }
        if self.timeout_secs == 0 {
            return Err(ArangoError::Config("timeout_secs must be positive".to_string()));
        }
        self.authentication().map(|_| ())
    }

    pub fn authentication(&self) -> Result<Authentication> {
        match self.authentication.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Authentication::None),
            "basic" => Ok(Authentication::basic(&self.username, &self.password)),
            "jwt" => Ok(Authentication::jwt(&self.username, &self.password)),
            "raw" => match &self.jwt {
                Some(token) if !token.is_empty() => Ok(Authentication::bearer(token)),
                _ => Err(ArangoError::Config("authentication 'raw' needs a jwt token".to_string())),
            },
            other => Err(ArangoError::Config(format!("unknown authentication '{}'", other))),
        }
    }

    pub fn http_config(&self) -> HttpConnectionConfig {
        HttpConnectionConfig {
            endpoints: self.endpoints.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            accept_invalid_certs: self.accept_invalid_certs,
            user_agent: self.user_agent.clone(),
        }
    }

    /// Build an HTTP connection and a client on top of it
    pub fn connect(&self) -> Result<Client> {
        self.validate()?;
        let conn = HttpConnection::new(self.http_config())?.with_authentication(self.authentication()?);
        Ok(Client::new(Arc::new(conn)))
    }
}
