//! Common test utilities

pub mod sensor_mock;

pub use sensor_mock::MockSensorEndpoint;
