//! Network seam between the dispatcher and the market-intelligence backend.

use crate::config::Credential;
use crate::error::TransportError;
use async_trait::async_trait;
use dcintel_core::{Parameters, ToolId};
use std::time::Duration;

/// A fully resolved GET request for one attempt.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub tool: ToolId,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub credential: Option<Credential>,
}

impl HttpRequest {
    pub fn for_call(tool: ToolId, parameters: &Parameters, credential: Option<Credential>) -> Self {
        Self {
            tool,
            path: tool.path(parameters),
            query: tool.query(parameters),
            credential,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    /// Parsed `Retry-After` header (seconds form).
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl HttpReply {
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.to_string(),
        }
    }
}

/// Issues one HTTP attempt. Retries, budgets and caching live above this.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &HttpRequest) -> Result<HttpReply, TransportError>;
}

/// Parse a `Retry-After` value given in whole seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use crate::error::ConfigError;
    use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
    use reqwest::Client;

    /// reqwest-backed transport against the backend base URL.
    pub struct HttpTransport {
        client: Client,
        base_url: String,
    }

    impl HttpTransport {
        pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
            let parsed = url::Url::parse(base_url).map_err(|e| ConfigError::BaseUrl {
                url: base_url.to_string(),
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::BaseUrl {
                    url: base_url.to_string(),
                    reason: format!("unsupported scheme '{}'", parsed.scheme()),
                });
            }
            let client = Client::builder()
                .timeout(timeout)
                .user_agent(concat!("dcintel/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| ConfigError::Client(e.to_string()))?;
            Ok(Self {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            })
        }
    }

    #[async_trait]
    impl Transport for HttpTransport {
        async fn get(&self, request: &HttpRequest) -> Result<HttpReply, TransportError> {
            let url = format!("{}{}", self.base_url, request.path);
            let mut builder = self
                .client
                .get(&url)
                .header("Accept", "application/json")
                .query(&request.query);
            builder = match &request.credential {
                Some(Credential::Bearer(token)) => {
                    builder.header(AUTHORIZATION, format!("Bearer {token}"))
                }
                Some(Credential::ApiKey(key)) => builder.header("X-API-Key", key),
                None => builder,
            };

            let response = builder.send().await.map_err(classify)?;
            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.map_err(classify)?;
            Ok(HttpReply {
                status,
                retry_after,
                body,
            })
        }
    }

    fn classify(e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}
