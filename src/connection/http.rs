use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::AUTHORIZATION;
use tracing::{debug, warn};
use url::Url;
use crate::common::error::{ArangoError, Result};
use crate::connection::auth::{Authentication, JwtRequest, JwtResponse};
use crate::connection::request::Request;
use crate::connection::response::Response;
use crate::connection::Connection;

/// Settings for [`HttpConnection`]
#[derive(Debug, Clone)]
pub struct HttpConnectionConfig {
    pub endpoints: Vec<String>,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
    pub user_agent: Option<String>,
}

impl Default for HttpConnectionConfig {
    fn default() -> Self {
        HttpConnectionConfig {
            endpoints: vec!["http://localhost:8529".to_string()],
            timeout: Duration::from_secs(60),
            accept_invalid_certs: false,
            user_agent: None,
        }
    }
}

/// HTTP/1.1 JSON transport with failover between endpoints.
///
/// Requests go to the endpoint that last answered. When an endpoint cannot
/// be reached the next one is tried until every endpoint has failed once.
pub struct HttpConnection {
    client: reqwest::Client,
    endpoints: RwLock<Vec<Url>>,
    current: AtomicUsize,
    auth: RwLock<Authentication>,
    jwt_token: RwLock<Option<String>>,
}

fn parse_endpoints(endpoints: &[String]) -> Result<Vec<Url>> {
    if endpoints.is_empty() {
        return Err(ArangoError::invalid_argument("at least one endpoint is required"));
    }
    endpoints
        .iter()
        .map(|endpoint| {
            // the server reports endpoints as tcp:// and ssl://
            let normalized = if let Some(rest) = endpoint.strip_prefix("tcp://") {
                format!("http://{}", rest)
            } else if let Some(rest) = endpoint.strip_prefix("ssl://") {
                format!("https://{}", rest)
            } else {
                endpoint.clone()
            };
            let url = Url::parse(&normalized)?;
            match url.scheme() {
                "http" | "https" => Ok(url),
                scheme => Err(ArangoError::invalid_argument(
                    format!("unsupported endpoint scheme '{}' in '{}'", scheme, endpoint)
                )),
            }
        })
        .collect()
}

impl HttpConnection {
    pub fn new(config: HttpConnectionConfig) -> Result<Self> {
        let endpoints = parse_endpoints(&config.endpoints)?;

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs);
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let client = builder.build()?;

        Ok(HttpConnection {
            client,
            endpoints: RwLock::new(endpoints),
            current: AtomicUsize::new(0),
            auth: RwLock::new(Authentication::None),
            jwt_token: RwLock::new(None),
        })
    }

    /// Connection to a single endpoint with default settings
    pub fn single(endpoint: impl Into<String>) -> Result<Self> {
        Self::new(HttpConnectionConfig {
            endpoints: vec![endpoint.into()],
            ..Default::default()
        })
    }

    pub fn with_authentication(self, auth: Authentication) -> Self {
        *self.auth.write() = auth;
        self
    }

    async fn fetch_jwt(&self, endpoint: &Url, username: &str, password: &str) -> Result<String> {
        let url = endpoint.join("/_open/auth")?;
        debug!(endpoint = %endpoint, "requesting JWT");
        let resp = self
            .client
            .post(url)
            .json(&JwtRequest { username, password })
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        let response = Response::new(status).with_body(body);
        response.check_status(&[200])?;
        let token: JwtResponse = response.parse_body()?;
        *self.jwt_token.write() = Some(token.jwt.clone());
        Ok(token.jwt)
    }

    async fn authorization(&self, endpoint: &Url, refresh: bool) -> Result<Option<String>> {
        let auth = self.auth.read().clone();
        match auth {
            Authentication::None => Ok(None),
            Authentication::Basic { .. } => Ok(None),
            Authentication::Raw(value) => Ok(Some(value)),
            Authentication::Jwt { username, password } => {
                let cached = if refresh { None } else { self.jwt_token.read().clone() };
                let token = match cached {
                    Some(token) => token,
                    None => self.fetch_jwt(endpoint, &username, &password).await?,
                };
                Ok(Some(format!("bearer {}", token)))
            }
        }
    }

    async fn send_to(&self, endpoint: &Url, request: &Request, refresh_auth: bool) -> Result<Response> {
        let url = request.url(endpoint)?;
        let mut builder = self.client.request(request.method.into(), url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        let basic = match &*self.auth.read() {
            Authentication::Basic { username, password } => Some((username.clone(), password.clone())),
            _ => None,
        };
        if let Some((username, password)) = basic {
            builder = builder.basic_auth(username, Some(password));
        }
        if let Some(value) = self.authorization(endpoint, refresh_auth).await? {
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!(method = request.method.as_str(), path = %request.path, endpoint = %endpoint, "sending request");
        let resp = builder.send().await?;

        let status_code = resp.status().as_u16();
        let headers: HashMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp.bytes().await?;

        Ok(Response {
            status_code,
            headers,
            body,
            endpoint: endpoint.to_string(),
        })
    }

    async fn send_with_auth(&self, endpoint: &Url, request: &Request) -> Result<Response> {
        let response = self.send_to(endpoint, request, false).await?;
        let is_jwt = matches!(&*self.auth.read(), Authentication::Jwt { .. });
        if response.status_code == 401 && is_jwt {
            debug!(endpoint = %endpoint, "JWT rejected, refreshing token");
            return self.send_to(endpoint, request, true).await;
        }
        Ok(response)
    }
}

#[async_trait]
impl Connection for HttpConnection {
    async fn execute(&self, request: Request) -> Result<Response> {
        let endpoints = self.endpoints.read().clone();
        if endpoints.is_empty() {
            return Err(ArangoError::transport("no endpoints configured"));
        }

        let start = self.current.load(Ordering::Relaxed) % endpoints.len();
        let mut last_error = None;
        for attempt in 0..endpoints.len() {
            let index = (start + attempt) % endpoints.len();
            let endpoint = &endpoints[index];
            match self.send_with_auth(endpoint, &request).await {
                Ok(response) => {
                    if attempt > 0 {
                        self.current.store(index, Ordering::Relaxed);
                    }
                    return Ok(response);
                }
                Err(err) if err.is_transport() => {
                    warn!(endpoint = %endpoint, error = %err, "endpoint failed, trying next");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| ArangoError::transport("all endpoints failed")))
    }

    fn endpoints(&self) -> Vec<String> {
        self.endpoints.read().iter().map(|url| url.as_str().trim_end_matches('/').to_string()).collect()
    }

    fn update_endpoints(&self, endpoints: &[String]) -> Result<()> {
        let parsed = parse_endpoints(endpoints)?;
        *self.endpoints.write() = parsed;
        self.current.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn set_authentication(&self, auth: Authentication) -> Result<()> {
        *self.auth.write() = auth;
        *self.jwt_token.write() = None;
        Ok(())
    }
}
