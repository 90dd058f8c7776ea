//! Immutable endpoint description used by the fetcher

use super::AccessoryConfig;
use crate::error::{Result, SensorError};
use reqwest::Method;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Where and how to poll, fixed for the process lifetime
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub url: Url,
    pub method: Method,

    /// PEM bytes of an additional trusted CA, loaded once
    pub trust_anchor: Option<Vec<u8>>,

    /// Response cache TTL; zero disables caching
    pub cache_expiration: Duration,

    pub timeout: Duration,
}

impl EndpointConfig {
    /// Endpoint with defaults: GET, no custom CA, 60 s cache, 5 s timeout
    pub fn new(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            trust_anchor: None,
            cache_expiration: Duration::from_secs(super::DEFAULT_CACHE_EXPIRATION),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_cache_expiration(mut self, expiration: Duration) -> Self {
        self.cache_expiration = expiration;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_trust_anchor(mut self, pem: Vec<u8>) -> Self {
        self.trust_anchor = Some(pem);
        self
    }

    /// Build from a validated accessory config; an unreadable CA file is fatal
    pub(crate) fn from_accessory(config: &AccessoryConfig) -> Result<Self> {
        let raw_url = config.url.as_deref().unwrap_or_default().trim();
        let url = Url::parse(raw_url)
            .map_err(|e| SensorError::config(format!("Invalid url '{raw_url}': {e}")))?;
        let method = Method::from_bytes(config.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| SensorError::config(format!("Invalid method '{}'", config.method)))?;

        let mut endpoint = Self::new(url)
            .with_method(method)
            .with_cache_expiration(Duration::from_secs(config.cache_expiration))
            .with_timeout(config.timeout);

        if let Some(path) = &config.certificate_ca {
            let pem = std::fs::read(path).map_err(|e| {
                SensorError::config(format!(
                    "Cannot read certificateCA {}: {e}",
                    path.display()
                ))
            })?;
            info!("Loaded custom CA certificate from {}", path.display());
            endpoint = endpoint.with_trust_anchor(pem);
        }

        Ok(endpoint)
    }
}
