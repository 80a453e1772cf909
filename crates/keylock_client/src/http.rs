//! reqwest-backed transport.

use crate::error::ClientResult;
use crate::transport::{ClusterRequest, ClusterResponse, Method, Transport, TransportError};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::time::Duration;

/// Transport speaking plain HTTP to cluster nodes.
///
/// Node addresses may be bare `host:port` pairs or full base URLs.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client.
    http: HttpClient,
}

impl HttpTransport {
    /// Create a transport whose exchanges give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(timeout: Duration) -> ClientResult<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Build a full URL from a node address and a path.
    fn url(address: &str, path: &str) -> String {
        let base = address.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{}{}", base, path)
        } else {
            format!("http://{}{}", base, path)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        address: &str,
        request: &ClusterRequest,
    ) -> Result<ClusterResponse, TransportError> {
        let url = Self::url(address, &request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.http.request(method, &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Unreachable {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| TransportError::Body {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

        Ok(ClusterResponse::new(status, body.to_vec()))
    }
}
