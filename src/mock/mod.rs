//! Mock implementations for testing
//!
//! This module provides a scripted transport that records every request it
//! receives, so cache behaviour can be asserted without a server.

use crate::client::{HttpTransport, TransportRequest, TransportResponse};
use crate::error::{Result, SensorError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted reply of the mock transport
#[derive(Debug, Clone)]
pub enum MockReply {
    Json(u16, Value),
    Raw(u16, Vec<u8>),
    NetworkError(String),
}

/// Mock transport for testing
///
/// Replies are consumed in order; once only one remains it is repeated.
#[derive(Debug)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<TransportRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockTransport {
    /// Create a mock that always answers 200 with `body`
    pub fn with_json(body: Value) -> Self {
        Self::with_replies(vec![MockReply::Json(200, body)])
    }

    /// Create a mock with a sequence of replies
    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Delay every reply, to keep requests in flight
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of requests executed so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests executed so far
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self) -> Option<MockReply> {
        let mut replies = self.replies.lock().ok()?;
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: &TransportRequest) -> Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let url = request.url.as_str();
        match self.next_reply() {
            Some(MockReply::Json(status, body)) => Ok(TransportResponse {
                status,
                body: serde_json::to_vec(&body)?,
            }),
            Some(MockReply::Raw(status, body)) => Ok(TransportResponse { status, body }),
            Some(MockReply::NetworkError(message)) => Err(SensorError::network(url, message)),
            None => Err(SensorError::network(url, "no mock reply configured")),
        }
    }
}
