//! API client for the platform under test
//!
//! Thin JSON client bound to one API endpoint, a bearer token and a namespace.

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Namespace header understood by the platform API
pub const NAMESPACE_HEADER: &str = "X-Namespace";

/// API client errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0}ms")]
    Timeout(u128),

    #[error("Connection refused to {0}")]
    ConnectionRefused(String),

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },
}

/// Client bound to one platform endpoint
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    namespace: Option<String>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, accept_invalid_certs: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: None,
            namespace: None,
            timeout,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Same endpoint and credentials, different namespace
    pub fn in_namespace(&self, namespace: impl Into<String>) -> Self {
        self.clone().with_namespace(namespace)
    }

    /// Build full URL
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, self.build_url(path));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(namespace) = &self.namespace {
            builder = builder.header(NAMESPACE_HEADER, namespace);
        }
        builder
    }

    async fn send(&self, method: Method, path: &str, builder: RequestBuilder) -> Result<String> {
        let url = self.build_url(path);
        debug!("Sending {} request to {}", method, url);

        let start = Instant::now();
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!(ApiError::Timeout(self.timeout.as_millis()))
            } else if e.is_connect() {
                anyhow::anyhow!(ApiError::ConnectionRefused(url.clone()))
            } else {
                anyhow::anyhow!(ApiError::RequestFailed(e.to_string()))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        debug!(
            "Response: {} {} in {}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            start.elapsed().as_millis()
        );

        if !status.is_success() {
            return Err(ApiError::Status {
                method: method.to_string(),
                url,
                status: status.as_u16(),
                body,
            }
            .into());
        }
        Ok(body)
    }

    fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
        let body = if body.trim().is_empty() { "null" } else { body };
        serde_json::from_str(body).context("Failed to decode response body")
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self
            .send(Method::GET, path, self.request(Method::GET, path))
            .await?;
        Self::decode(&body)
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, payload: &B) -> Result<T> {
        let builder = self.request(Method::POST, path).json(payload);
        let body = self.send(Method::POST, path, builder).await?;
        Self::decode(&body)
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, payload: &B) -> Result<T> {
        let builder = self.request(Method::PUT, path).json(payload);
        let body = self.send(Method::PUT, path, builder).await?;
        Self::decode(&body)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, self.request(Method::DELETE, path))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new("https://api.example.com/", Duration::from_secs(5), true).unwrap()
    }

    #[test]
    fn test_build_url() {
        let client = client();
        assert_eq!(client.build_url("/namespaces"), "https://api.example.com/namespaces");
        assert_eq!(client.build_url("namespaces"), "https://api.example.com/namespaces");
        assert_eq!(client.build_url("http://other/x"), "http://other/x");
    }

    #[test]
    fn test_in_namespace_keeps_credentials() {
        let client = client().with_token("t").with_namespace("/acme");
        let child = client.in_namespace("/acme/child");
        assert_eq!(child.namespace(), Some("/acme/child"));
        assert_eq!(client.namespace(), Some("/acme"));
        assert_eq!(child.token.as_deref(), Some("t"));
    }

    #[test]
    fn test_decode_empty_body() {
        let value: Option<u32> = ApiClient::decode("").unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let client = ApiClient::new("http://127.0.0.1:1", Duration::from_secs(2), false).unwrap();
        let err = client.get::<serde_json::Value>("/x").await.unwrap_err();
        assert!(err.downcast_ref::<ApiError>().is_some());
    }
}
