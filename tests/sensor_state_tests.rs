//! End-to-end tests for sensor reads over real HTTP
//!
//! Each test runs the production reqwest transport against a WireMock
//! endpoint and checks values, errors and request counts.

mod common;

use common::MockSensorEndpoint;
use http_sensor_bridge::{
    cache::BodyCache,
    services::{FetchStatus, SensorField},
    Accessory, AccessoryConfig, SensorError,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;
use serial_test::serial;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{matchers::path, Mock, ResponseTemplate};

fn accessory(config: AccessoryConfig) -> Accessory {
    Accessory::from_config(config, Arc::new(BodyCache::new())).unwrap()
}

#[tokio::test]
async fn test_reads_share_one_cached_request() {
    let endpoint = MockSensorEndpoint::start().await;
    endpoint
        .serve_json(json!({"reading": {"tempC": 21.5, "rh": 47}}), 1)
        .await;

    let accessory = accessory(AccessoryConfig {
        temperature_query: Some("reading.tempC".to_string()),
        humidity_query: Some("reading.rh".to_string()),
        cache_expiration: 30,
        ..endpoint.config()
    });
    let state = accessory.state();

    assert_eq!(
        state.get_value(SensorField::Temperature).await.unwrap(),
        json!(21.5)
    );
    assert_eq!(
        state.get_value(SensorField::Humidity).await.unwrap(),
        json!(47)
    );
    assert_eq!(state.status(), FetchStatus::Idle);
    assert_eq!(state.last_outcome().await, Some(FetchStatus::Updated));
    assert!(state.last_result().await.unwrap().from_cache);
}

#[tokio::test]
async fn test_zero_expiration_fetches_every_time() {
    let endpoint = MockSensorEndpoint::start().await;
    endpoint.serve_json(json!({"reading": {"tempC": 18}}), 2).await;

    let accessory = accessory(AccessoryConfig {
        temperature_query: Some("reading.tempC".to_string()),
        cache_expiration: 0,
        ..endpoint.config()
    });

    for _ in 0..2 {
        assert_eq!(
            accessory
                .state()
                .get_value(SensorField::Temperature)
                .await
                .unwrap(),
            json!(18)
        );
    }
}

#[tokio::test]
async fn test_computed_query() {
    let endpoint = MockSensorEndpoint::start().await;
    endpoint
        .serve_json(
            json!({"sensors": [{"kind": "temp", "f": 70.7}, {"kind": "rh", "value": 40}]}),
            1,
        )
        .await;

    let accessory = accessory(AccessoryConfig {
        temperature_query: Some("$round((sensors[kind = 'temp'].f - 32) / 1.8, 1)".to_string()),
        humidity_query: Some("sensors[kind = 'rh'].value".to_string()),
        ..endpoint.config()
    });

    assert_eq!(
        accessory
            .state()
            .get_value(SensorField::Temperature)
            .await
            .unwrap(),
        json!(21.5)
    );
    assert_eq!(
        accessory
            .state()
            .get_value(SensorField::Humidity)
            .await
            .unwrap(),
        json!(40)
    );
}

#[rstest]
#[case(json!({"battery": 15}), json!(1))]
#[case(json!({"battery": 20}), json!(1))]
#[case(json!({"battery": 25}), json!(0))]
#[tokio::test]
async fn test_battery_low(#[case] body: serde_json::Value, #[case] expected: serde_json::Value) {
    let endpoint = MockSensorEndpoint::start().await;
    endpoint.serve_json(body, 1).await;

    let accessory = accessory(AccessoryConfig {
        battery_query: Some("battery".to_string()),
        battery_low: 20.0,
        ..endpoint.config()
    });

    assert_eq!(
        accessory
            .state()
            .get_value(SensorField::BatteryLow)
            .await
            .unwrap(),
        expected
    );
}

#[tokio::test]
async fn test_unconfigured_field_makes_no_request() {
    let endpoint = MockSensorEndpoint::start().await;
    endpoint.serve_json(json!({}), 0).await;

    let accessory = accessory(AccessoryConfig {
        temperature_query: Some("reading.tempC".to_string()),
        ..endpoint.config()
    });

    let err = accessory
        .state()
        .get_value(SensorField::BatteryLow)
        .await
        .unwrap_err();
    assert!(matches!(err, SensorError::FieldNotConfigured(f) if f == "batteryLow"));
}

#[tokio::test]
async fn test_server_error_surfaces_without_stale_value() {
    let endpoint = MockSensorEndpoint::start().await;
    endpoint.serve_status(500, "internal error").await;

    let accessory = accessory(AccessoryConfig {
        temperature_query: Some("reading.tempC".to_string()),
        ..endpoint.config()
    });
    let state = accessory.state();

    let err = state
        .get_value(SensorField::Temperature)
        .await
        .unwrap_err();
    assert!(matches!(err, SensorError::HttpStatus { status: 500, .. }));
    assert!(err.to_string().contains(&endpoint.url));
    assert_eq!(state.last_outcome().await, Some(FetchStatus::Failed));
    assert!(state.last_result().await.is_none());
}

#[tokio::test]
async fn test_non_json_body_is_rejected() {
    let endpoint = MockSensorEndpoint::start().await;
    endpoint.serve_status(200, "<html>ok</html>").await;

    let accessory = accessory(AccessoryConfig {
        humidity_query: Some("rh".to_string()),
        ..endpoint.config()
    });

    let err = accessory
        .state()
        .get_value(SensorField::Humidity)
        .await
        .unwrap_err();
    assert!(matches!(err, SensorError::InvalidBody { .. }));
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let endpoint = MockSensorEndpoint::start().await;
    Mock::given(path(common::sensor_mock::STATUS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"t": 1}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&endpoint.server)
        .await;

    let accessory = accessory(AccessoryConfig {
        temperature_query: Some("t".to_string()),
        timeout: Duration::from_millis(200),
        ..endpoint.config()
    });

    let err = accessory
        .state()
        .get_value(SensorField::Temperature)
        .await
        .unwrap_err();
    assert!(matches!(err, SensorError::Timeout { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_accessories_share_cache_for_identical_requests() {
    let endpoint = MockSensorEndpoint::start().await;
    endpoint
        .serve_json(json!({"reading": {"tempC": 20, "rh": 50}}), 1)
        .await;

    let cache = Arc::new(BodyCache::new());
    let thermometer = Accessory::from_config(
        AccessoryConfig {
            temperature_query: Some("reading.tempC".to_string()),
            ..endpoint.config()
        },
        cache.clone(),
    )
    .unwrap();
    let hygrometer = Accessory::from_config(
        AccessoryConfig {
            humidity_query: Some("reading.rh".to_string()),
            ..endpoint.config()
        },
        cache.clone(),
    )
    .unwrap();

    assert_eq!(
        thermometer
            .state()
            .get_value(SensorField::Temperature)
            .await
            .unwrap(),
        json!(20)
    );
    assert_eq!(
        hygrometer
            .state()
            .get_value(SensorField::Humidity)
            .await
            .unwrap(),
        json!(50)
    );
    assert_eq!(cache.stats().await.hits, 1);
}

#[tokio::test]
async fn test_config_file_round_trip() {
    let endpoint = MockSensorEndpoint::start().await;
    endpoint.serve_json(json!({"bat": 9}), 1).await;

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "url = \"{}\"\nname = \"Garden\"\nbatteryQuery = \"bat\"\nbatteryLow = 10\ntimeout = \"2s\"",
        endpoint.url
    )
    .unwrap();

    let config = AccessoryConfig::from_file(file.path()).unwrap();
    let accessory = accessory(config);

    assert_eq!(accessory.information().name, "Garden");
    assert_eq!(
        accessory
            .state()
            .get_value(SensorField::BatteryLow)
            .await
            .unwrap(),
        json!(1)
    );
}

#[test]
fn test_missing_certificate_is_fatal() {
    let config = AccessoryConfig {
        url: Some("https://sensor.local/status".to_string()),
        name: Some("Attic".to_string()),
        certificate_ca: Some("/nonexistent/ca.pem".into()),
        ..Default::default()
    };

    let err = Accessory::from_config(config, Arc::new(BodyCache::new())).unwrap_err();
    assert!(matches!(err, SensorError::Config(m) if m.contains("certificateCA")));
}

#[tokio::test]
#[serial]
async fn test_env_override_redirects_url() {
    let endpoint = MockSensorEndpoint::start().await;
    endpoint.serve_json(json!({"rh": 33}), 1).await;

    let config = temp_env::with_var("HTTP_SENSOR_URL", Some(endpoint.url.as_str()), || {
        let mut config = AccessoryConfig {
            url: Some("http://unused.invalid/status".to_string()),
            name: Some("Cellar".to_string()),
            humidity_query: Some("rh".to_string()),
            ..Default::default()
        };
        config.apply_env_overrides().unwrap();
        config
    });

    assert_eq!(
        accessory(config)
            .state()
            .get_value(SensorField::Humidity)
            .await
            .unwrap(),
        json!(33)
    );
}
