//! Platform handle
//!
//! Transport and authentication handles given to setup functions and test
//! bodies: API clients for the public and private endpoints, platform facts
//! and push listener defaults.

mod client;

pub use client::{ApiClient, ApiError, NAMESPACE_HEADER};

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::RunnerConfig;
use crate::push::{EventType, Listener, DEFAULT_NEGATIVE_TIMEOUT, DEFAULT_POSITIVE_TIMEOUT};

/// Shared, read-only view of the platform under test
#[derive(Clone, Debug)]
pub struct Platform {
    public: Option<ApiClient>,
    private: Option<ApiClient>,
    info: Arc<BTreeMap<String, String>>,
    positive_timeout: Duration,
    negative_timeout: Duration,
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            public: None,
            private: None,
            info: Arc::new(BTreeMap::new()),
            positive_timeout: DEFAULT_POSITIVE_TIMEOUT,
            negative_timeout: DEFAULT_NEGATIVE_TIMEOUT,
        }
    }
}

impl Platform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for whichever endpoints are configured
    pub fn from_config(config: &RunnerConfig) -> Result<Self> {
        let mut platform = Self::new()
            .with_info(config.platform_info.clone())
            .with_push_timeouts(config.push_positive_timeout, config.push_negative_timeout);

        if let Some(url) = &config.api_public {
            let mut client = ApiClient::new(url, config.request_timeout, config.accept_invalid_certs)?;
            if let Some(token) = &config.token {
                client = client.with_token(token);
            }
            if let Some(namespace) = &config.namespace {
                client = client.with_namespace(namespace);
            }
            debug!("Public API: {}", url);
            platform = platform.with_public(client);
        }

        if let Some(url) = &config.api_private {
            let mut client = ApiClient::new(url, config.request_timeout, config.accept_invalid_certs)?;
            if let Some(namespace) = &config.namespace {
                client = client.with_namespace(namespace);
            }
            debug!("Private API: {}", url);
            platform = platform.with_private(client);
        }

        Ok(platform)
    }

    pub fn with_public(mut self, client: ApiClient) -> Self {
        self.public = Some(client);
        self
    }

    pub fn with_private(mut self, client: ApiClient) -> Self {
        self.private = Some(client);
        self
    }

    pub fn with_info(mut self, info: BTreeMap<String, String>) -> Self {
        self.info = Arc::new(info);
        self
    }

    pub fn with_push_timeouts(mut self, positive: Duration, negative: Duration) -> Self {
        self.positive_timeout = positive;
        self.negative_timeout = negative;
        self
    }

    /// Client for the public API, if configured
    pub fn public(&self) -> Option<&ApiClient> {
        self.public.as_ref()
    }

    /// Client for the private API, if configured
    pub fn private(&self) -> Option<&ApiClient> {
        self.private.as_ref()
    }

    pub fn info(&self, key: &str) -> Option<&str> {
        self.info.get(key).map(String::as_str)
    }

    pub fn info_map(&self) -> &BTreeMap<String, String> {
        &self.info
    }

    /// Listener for an expected event, with the configured timeouts
    pub fn expect_push(&self, identity: impl Into<String>, event_type: EventType) -> Listener {
        Listener::expect(identity, event_type)
            .with_positive_timeout(self.positive_timeout)
            .with_negative_timeout(self.negative_timeout)
    }

    /// Listener for an event that must not show up, with the configured timeouts
    pub fn expect_no_push(&self, identity: impl Into<String>, event_type: EventType) -> Listener {
        Listener::expect_none(identity, event_type)
            .with_positive_timeout(self.positive_timeout)
            .with_negative_timeout(self.negative_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_platform_is_empty() {
        let platform = Platform::default();
        assert!(platform.public().is_none());
        assert!(platform.private().is_none());
        assert!(platform.info_map().is_empty());
    }

    #[test]
    fn test_from_config() {
        let mut config = RunnerConfig {
            api_public: Some("https://api.example.com".into()),
            token: Some("token".into()),
            namespace: Some("/acme".into()),
            push_negative_timeout: Duration::from_secs(1),
            ..RunnerConfig::default()
        };
        config.platform_info.insert("region".into(), "eu".into());

        let platform = Platform::from_config(&config).unwrap();
        assert_eq!(platform.public().unwrap().namespace(), Some("/acme"));
        assert!(platform.private().is_none());
        assert_eq!(platform.info("region"), Some("eu"));
        assert_eq!(
            platform
                .expect_no_push("namespace", EventType::Delete)
                .timeout(),
            Duration::from_secs(1)
        );
        assert_eq!(
            platform.expect_push("namespace", EventType::Create).timeout(),
            Duration::from_secs(120)
        );
    }
}
