//! WireMock-based sensor endpoint
//!
//! Serves a JSON status document the way a networked sensor would, so the
//! whole stack (reqwest transport, cache, queries) runs against real HTTP.

use http_sensor_bridge::AccessoryConfig;
use serde_json::Value;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const STATUS_PATH: &str = "/status";

/// Mock sensor exposing `GET /status`
pub struct MockSensorEndpoint {
    pub server: MockServer,
    pub url: String,
}

impl MockSensorEndpoint {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let url = format!("{}{}", server.uri(), STATUS_PATH);
        Self { server, url }
    }

    /// Answer `GET /status` with `body`, expecting exactly `calls` requests
    pub async fn serve_json(&self, body: Value, calls: u64) {
        Mock::given(method("GET"))
            .and(path(STATUS_PATH))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Answer every request with `status` and a raw body
    pub async fn serve_status(&self, status: u16, body: &str) {
        Mock::given(path(STATUS_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Accessory config pointing at this endpoint
    pub fn config(&self) -> AccessoryConfig {
        AccessoryConfig {
            url: Some(self.url.clone()),
            name: Some("Test Sensor".to_string()),
            ..Default::default()
        }
    }
}
