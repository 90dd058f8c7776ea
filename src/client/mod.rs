//! HTTP transport abstraction
//!
//! The fetcher only needs "send this request, give me status and body".
//! Keeping that behind a trait lets tests script responses and count
//! network calls without a server.

pub mod http_client;

pub use http_client::ReqwestTransport;

use crate::error::Result;
use async_trait::async_trait;
use reqwest::Method;
use url::Url;

/// Request issued against the polled endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl TransportRequest {
    /// Request with `Accept: application/json`
    pub fn json(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: vec![("Accept".to_string(), "application/json".to_string())],
        }
    }
}

/// Raw response; status handling is left to the caller
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used by the remote state fetcher
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute a request; connection failures and timeouts are errors,
    /// any received status (including 5xx) is a response
    async fn execute(&self, request: &TransportRequest) -> Result<TransportResponse>;
}
