//! HTTP transport for lookup requests.
//!
//! `Transport` is the seam between the fetch worker and the network. The
//! production implementation wraps reqwest; when proxies are configured one
//! client is built per proxy and a client is picked at random per attempt.

mod identity;
mod user_agent;

pub use identity::{IdentityGenerator, RequestIdentity};
pub use user_agent::{languages_for, BrowserFamily, DEFAULT_LANGUAGE, REFERERS, USER_AGENTS};

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Proxy};
use thiserror::Error;
use url::Url;

use crate::models::NetworkErrorKind;

/// Status code and full text body of one response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// A failed request, classified for retry decisions.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: NetworkErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            NetworkErrorKind::Timeout
        } else if e.is_connect() {
            NetworkErrorKind::Connect
        } else if e.is_redirect() {
            NetworkErrorKind::Redirect
        } else if e.is_builder() {
            NetworkErrorKind::Builder
        } else if e.is_body() || e.is_decode() {
            NetworkErrorKind::Body
        } else if e.is_request() {
            NetworkErrorKind::Request
        } else {
            NetworkErrorKind::Other
        };
        Self::new(kind, e.to_string())
    }
}

/// Errors building the HTTP client.
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("Invalid proxy URL '{url}': {source}")]
    InvalidProxy {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to create HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Issues one GET per call with the given identity's headers.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &Url,
        identity: &RequestIdentity,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpClient {
    /// One client per proxy, or a single direct client.
    clients: Vec<Client>,
    compression: bool,
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    compression: bool,
    pool_limit: usize,
    proxies: Vec<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            compression: true,
            pool_limit: 100,
            proxies: Vec::new(),
        }
    }
}

impl HttpClientBuilder {
    /// Negotiate gzip/brotli/deflate bodies.
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Maximum idle pooled connections kept per host.
    pub fn pool_limit(mut self, limit: usize) -> Self {
        self.pool_limit = limit;
        self
    }

    /// Route attempts through these proxies, one chosen at random per attempt.
    pub fn proxies(mut self, proxies: Vec<String>) -> Self {
        self.proxies = proxies;
        self
    }

    pub fn build(self) -> Result<HttpClient, HttpClientError> {
        let clients = if self.proxies.is_empty() {
            vec![build_client(self.compression, self.pool_limit, None)?]
        } else {
            self.proxies
                .iter()
                .map(|proxy| build_client(self.compression, self.pool_limit, Some(proxy)))
                .collect::<Result<Vec<_>, _>>()?
        };

        if !self.proxies.is_empty() {
            tracing::info!(
                "HTTP client configured with {} proxy route(s)",
                self.proxies.len()
            );
        }

        Ok(HttpClient {
            clients,
            compression: self.compression,
        })
    }
}

fn build_client(
    compression: bool,
    pool_limit: usize,
    proxy: Option<&str>,
) -> Result<Client, HttpClientError> {
    let mut builder = Client::builder()
        .pool_max_idle_per_host(pool_limit)
        .gzip(compression)
        .brotli(compression)
        .deflate(compression);

    if let Some(proxy_url) = proxy {
        let proxy = Proxy::all(proxy_url).map_err(|source| HttpClientError::InvalidProxy {
            url: proxy_url.to_string(),
            source,
        })?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Number of routes (proxies, or 1 for direct).
    pub fn route_count(&self) -> usize {
        self.clients.len()
    }

    /// Route for the next attempt, uniformly at random.
    fn pick_route(&self) -> usize {
        if self.clients.len() <= 1 {
            return 0;
        }
        rand::rng().random_range(0..self.clients.len())
    }

    fn pick_client(&self) -> &Client {
        &self.clients[self.pick_route()]
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn get(
        &self,
        url: &Url,
        identity: &RequestIdentity,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.pick_client().get(url.clone()).timeout(timeout);
        for (name, value) in &identity.headers {
            // reqwest negotiates encodings itself when compression is on.
            if !self.compression && name.eq_ignore_ascii_case("Accept-Encoding") {
                continue;
            }
            request = request.header(*name, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_client_has_one_route() {
        let client = HttpClient::builder().build().unwrap();
        assert_eq!(client.route_count(), 1);
    }

    #[test]
    fn test_one_route_per_proxy() {
        let client = HttpClient::builder()
            .proxies(vec![
                "http://127.0.0.1:8080".to_string(),
                "socks5://127.0.0.1:9050".to_string(),
            ])
            .build()
            .unwrap();
        assert_eq!(client.route_count(), 2);
    }

    #[test]
    fn test_routes_are_picked_per_attempt() {
        let client = HttpClient::builder()
            .proxies(vec![
                "http://127.0.0.1:8080".to_string(),
                "http://127.0.0.1:8081".to_string(),
                "socks5://127.0.0.1:9050".to_string(),
            ])
            .build()
            .unwrap();
        let mut seen = [0usize; 3];
        for _ in 0..300 {
            seen[client.pick_route()] += 1;
        }
        assert!(seen.iter().all(|count| *count > 0), "{:?}", seen);
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        let err = HttpClient::builder()
            .proxies(vec!["not a url".to_string()])
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, HttpClientError::InvalidProxy { .. }));
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::new(NetworkErrorKind::Timeout, "deadline elapsed");
        assert_eq!(err.to_string(), "timeout: deadline elapsed");
    }
}
