//! Accessory assembly
//!
//! Turns a validated configuration into a ready [`SensorState`]: production
//! transport, shared response cache, compiled field queries.

use crate::cache::BodyCache;
use crate::client::{HttpTransport, ReqwestTransport};
use crate::config::{AccessoryConfig, AccessoryInformation, AccessoryParts, EndpointConfig};
use crate::error::Result;
use crate::services::{RemoteStateFetcher, SensorState};
use std::sync::Arc;
use tracing::info;

/// One configured sensor accessory
#[derive(Debug, Clone)]
pub struct Accessory {
    information: AccessoryInformation,
    state: Arc<SensorState>,
}

impl Accessory {
    /// Validate the config and build the accessory with a reqwest transport
    ///
    /// Fails on missing `url`/`name`, an invalid method or an unreadable
    /// `certificateCA`.
    pub fn from_config(config: AccessoryConfig, cache: Arc<BodyCache>) -> Result<Self> {
        let parts = config.into_parts()?;
        let transport = Arc::new(ReqwestTransport::new(&parts.endpoint)?);
        Ok(Self::build(parts, transport, cache))
    }

    /// Build from already validated parts and an explicit transport
    pub fn build(
        parts: AccessoryParts,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<BodyCache>,
    ) -> Self {
        let AccessoryParts {
            endpoint,
            fields,
            information,
        } = parts;

        log_endpoint(&information, &endpoint);
        let fetcher = RemoteStateFetcher::new(endpoint, fields, transport, cache);
        info!(
            "Accessory '{}' ready with fields {:?}",
            information.name,
            fetcher.configured_fields()
        );

        Self {
            information,
            state: Arc::new(SensorState::new(fetcher)),
        }
    }

    pub fn information(&self) -> &AccessoryInformation {
        &self.information
    }

    pub fn state(&self) -> &Arc<SensorState> {
        &self.state
    }
}

fn log_endpoint(information: &AccessoryInformation, endpoint: &EndpointConfig) {
    info!(
        "Accessory '{}' polls {} {} (cache {}s, timeout {:?}, custom CA: {})",
        information.name,
        endpoint.method,
        endpoint.url,
        endpoint.cache_expiration.as_secs(),
        endpoint.timeout,
        endpoint.trust_anchor.is_some()
    );
}
