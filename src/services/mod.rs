//! Sensor services
//!
//! The fetcher turns the endpoint into extracted field values; the sensor
//! state facade answers host reads on top of it.

pub mod models;
pub mod remote_state;
pub mod sensor_state;

pub use models::{numeric, FetchResult, FetchStatus, FieldName, FieldSpec, SensorField};
pub use remote_state::RemoteStateFetcher;
pub use sensor_state::{FieldListener, SensorState};
