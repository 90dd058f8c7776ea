//! Accessory configuration
//!
//! The configuration is read once at startup from a JSON or TOML file using
//! the accessory's camelCase keys (`url`, `temperatureQuery`,
//! `cacheExpiration`, `certificateCA`, ...), optionally overridden from the
//! environment, validated, and split into immutable parts.

pub mod endpoint;

pub use endpoint::EndpointConfig;

use crate::error::{Result, SensorError};
use crate::services::models::{FieldName, FieldSpec};
use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, time::Duration};
use tracing::debug;

/// Default cache expiration in seconds
pub const DEFAULT_CACHE_EXPIRATION: u64 = 60;

/// Default low-battery threshold
pub const DEFAULT_BATTERY_LOW: f64 = 20.0;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "HTTP_SENSOR_";

/// Raw accessory configuration as written by the user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryConfig {
    /// Endpoint to poll (required)
    #[serde(default)]
    pub url: Option<String>,

    /// HTTP verb
    #[serde(default = "default_method")]
    pub method: String,

    /// Display name (required)
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub serial: String,

    #[serde(default)]
    pub temperature_query: Option<String>,

    #[serde(default)]
    pub humidity_query: Option<String>,

    #[serde(default)]
    pub battery_query: Option<String>,

    /// Low-battery threshold (inclusive)
    #[serde(default = "default_battery_low")]
    pub battery_low: f64,

    /// Cache TTL in seconds; 0 disables caching
    #[serde(default = "default_cache_expiration")]
    pub cache_expiration: u64,

    /// PEM CA bundle trusted in addition to the system roots
    #[serde(default, rename = "certificateCA")]
    pub certificate_ca: Option<PathBuf>,

    /// HTTP request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_manufacturer() -> String {
    "Generic".to_string()
}

fn default_model() -> String {
    "Sensor".to_string()
}

fn default_battery_low() -> f64 {
    DEFAULT_BATTERY_LOW
}

fn default_cache_expiration() -> u64 {
    DEFAULT_CACHE_EXPIRATION
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Same syntax as the file's `timeout` ("1500ms", "2s"); a bare number is seconds
fn parse_timeout(raw: &str) -> std::result::Result<Duration, humantime::DurationError> {
    let raw = raw.trim();
    match raw.parse::<u64>() {
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => humantime::parse_duration(raw),
    }
}

impl Default for AccessoryConfig {
    fn default() -> Self {
        Self {
            url: None,
            method: default_method(),
            name: None,
            manufacturer: default_manufacturer(),
            model: default_model(),
            serial: String::new(),
            temperature_query: None,
            humidity_query: None,
            battery_query: None,
            battery_low: DEFAULT_BATTERY_LOW,
            cache_expiration: DEFAULT_CACHE_EXPIRATION,
            certificate_ca: None,
            timeout: default_timeout(),
        }
    }
}

/// Static accessory information handed to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessoryInformation {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
}

/// Validated, immutable pieces built from an [`AccessoryConfig`]
#[derive(Debug, Clone)]
pub struct AccessoryParts {
    pub endpoint: EndpointConfig,
    pub fields: Vec<FieldSpec>,
    pub information: AccessoryInformation,
}

impl AccessoryConfig {
    /// Load configuration from a `.json` or `.toml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SensorError::config(format!("Cannot read config {}: {e}", path.display()))
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let config: Self = if is_toml {
            toml::from_str(&contents).map_err(|e| {
                SensorError::config(format!("Invalid TOML in {}: {e}", path.display()))
            })?
        } else {
            serde_json::from_str(&contents).map_err(|e| {
                SensorError::config(format!("Invalid JSON in {}: {e}", path.display()))
            })?
        };

        debug!("Loaded accessory config from {}", path.display());
        Ok(config)
    }

    /// Apply `HTTP_SENSOR_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = env::var(format!("{ENV_PREFIX}URL")) {
            self.url = Some(url);
        }

        if let Ok(method) = env::var(format!("{ENV_PREFIX}METHOD")) {
            self.method = method;
        }

        if let Ok(expiration) = env::var(format!("{ENV_PREFIX}CACHE_EXPIRATION")) {
            self.cache_expiration = expiration.parse().map_err(|e| {
                SensorError::config(format!("Invalid {ENV_PREFIX}CACHE_EXPIRATION: {e}"))
            })?;
        }

        if let Ok(timeout) = env::var(format!("{ENV_PREFIX}TIMEOUT")) {
            self.timeout = parse_timeout(&timeout).map_err(|e| {
                SensorError::config(format!("Invalid {ENV_PREFIX}TIMEOUT: {e}"))
            })?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = self
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| SensorError::config("Missing required option 'url'"))?;

        let parsed = url::Url::parse(url)
            .map_err(|e| SensorError::config(format!("Invalid url '{url}': {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SensorError::config(format!(
                "Invalid url '{url}': scheme must be http or https"
            )));
        }

        if self.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            return Err(SensorError::config("Missing required option 'name'"));
        }

        reqwest::Method::from_bytes(self.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| SensorError::config(format!("Invalid method '{}'", self.method)))?;

        if !self.battery_low.is_finite() || self.battery_low < 0.0 {
            return Err(SensorError::config(format!(
                "Invalid batteryLow threshold {}",
                self.battery_low
            )));
        }

        if self.timeout.is_zero() {
            return Err(SensorError::config("Timeout must be greater than zero"));
        }

        Ok(())
    }

    /// One spec per quantity, in display order; empty queries count as absent
    pub fn field_specs(&self) -> Vec<FieldSpec> {
        FieldName::ALL
            .iter()
            .map(|name| match name {
                FieldName::Temperature => {
                    FieldSpec::new(*name, non_empty(&self.temperature_query))
                }
                FieldName::Humidity => FieldSpec::new(*name, non_empty(&self.humidity_query)),
                FieldName::Battery => {
                    FieldSpec::battery(non_empty(&self.battery_query), self.battery_low)
                }
            })
            .collect()
    }

    /// Validate and split into immutable parts; reads the CA file
    pub fn into_parts(self) -> Result<AccessoryParts> {
        self.validate()?;

        let fields = self.field_specs();
        let endpoint = EndpointConfig::from_accessory(&self)?;
        let information = AccessoryInformation {
            name: self.name.unwrap_or_default().trim().to_string(),
            manufacturer: self.manufacturer,
            model: self.model,
            serial: self.serial,
        };

        Ok(AccessoryParts {
            endpoint,
            fields,
            information,
        })
    }
}

fn non_empty(query: &Option<String>) -> Option<String> {
    query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
}
