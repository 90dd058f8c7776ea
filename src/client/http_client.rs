//! reqwest-backed transport with optional custom CA trust

use super::{HttpTransport, TransportRequest, TransportResponse};
use crate::config::EndpointConfig;
use crate::error::{Result, SensorError};
use async_trait::async_trait;
use reqwest::{Certificate, Client, ClientBuilder};
use std::time::Duration;
use tracing::debug;

const PEM_CERTIFICATE_MARKER: &[u8] = b"-----BEGIN CERTIFICATE-----";

/// Production transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client honouring the endpoint's timeout and trust anchor
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        let mut client_builder = ClientBuilder::new()
            .timeout(endpoint.timeout)
            .connect_timeout(endpoint.timeout.min(Duration::from_secs(10)))
            .user_agent(format!("http-sensor-bridge/{}", env!("CARGO_PKG_VERSION")));

        if let Some(pem) = &endpoint.trust_anchor {
            if !pem
                .windows(PEM_CERTIFICATE_MARKER.len())
                .any(|window| window == PEM_CERTIFICATE_MARKER)
            {
                return Err(SensorError::config(
                    "Invalid certificateCA: no PEM certificate found",
                ));
            }
            let certificate = Certificate::from_pem(pem)
                .map_err(|e| SensorError::config(format!("Invalid certificateCA: {e}")))?;
            client_builder = client_builder.add_root_certificate(certificate);
            debug!("Custom CA certificate added to trust store");
        }

        // Certificates are parsed when the client is built
        let client = client_builder.build().map_err(|e| match endpoint.trust_anchor {
            Some(_) => SensorError::config(format!("Invalid certificateCA: {e}")),
            None => SensorError::config(format!("Failed to build HTTP client: {e}")),
        })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &TransportRequest) -> Result<TransportResponse> {
        debug!("HTTP {} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let url = request.url.as_str();
        let response = builder.send().await.map_err(|e| map_error(url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_error(url, e))?
            .to_vec();

        debug!("HTTP {} from {} ({} bytes)", status, url, body.len());
        Ok(TransportResponse { status, body })
    }
}

fn map_error(url: &str, e: reqwest::Error) -> SensorError {
    if e.is_timeout() {
        SensorError::timeout(url, e.to_string())
    } else {
        SensorError::network(url, e.to_string())
    }
}
