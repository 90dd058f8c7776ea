//! HTTP sensor bridge
//!
//! Polls a JSON HTTP endpoint and exposes temperature, humidity and battery
//! readings to a smart-home host.
//!
//! # Features
//!
//! - Query expressions over the response body, one per field
//! - Response cache keyed by request fingerprint, with a configurable TTL
//! - Derived `batteryLow` characteristic with an inclusive threshold
//! - Custom CA trust for self-signed endpoints
//! - Host integration through the [`host::HostAdapter`] trait

// Core modules
pub mod accessory;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod query;
pub mod services;

// Test support modules - available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

// Re-export main types for convenience
pub use accessory::Accessory;
pub use config::AccessoryConfig;
pub use error::{Result, SensorError};
pub use services::{SensorField, SensorState};
