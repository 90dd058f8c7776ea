//! Sensor state facade
//!
//! Answers host reads for a single accessory. Every read triggers a fetch
//! (answered from the response cache while it is fresh), and the newest
//! successful result replaces the previous one as a whole. Listeners get
//! every available value pushed after each successful fetch.

use crate::config::DEFAULT_BATTERY_LOW;
use crate::error::{Result, SensorError};
use crate::services::models::{numeric, FetchResult, FetchStatus, FieldName, SensorField};
use crate::services::remote_state::RemoteStateFetcher;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::debug;

/// Receives field values pushed after a successful fetch
pub trait FieldListener: Send + Sync {
    fn update_field(&self, field: SensorField, value: &Value);
}

/// Outcome of the most recent completed fetch
#[derive(Debug, Clone, Default)]
struct Outcome {
    /// Sequence number of the fetch that produced this outcome
    seq: u64,
    status: Option<FetchStatus>,
    error: Option<String>,
    result: Option<Arc<FetchResult>>,
}

/// Read facade over a [`RemoteStateFetcher`]
pub struct SensorState {
    fetcher: RemoteStateFetcher,
    outcome: RwLock<Outcome>,
    in_flight: AtomicUsize,
    next_seq: AtomicU64,
    listeners: Mutex<Vec<Arc<dyn FieldListener>>>,
}

/// Decrements the in-flight counter even if the fetch future is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SensorState {
    pub fn new(fetcher: RemoteStateFetcher) -> Self {
        Self {
            fetcher,
            outcome: RwLock::new(Outcome::default()),
            in_flight: AtomicUsize::new(0),
            next_seq: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Push every available value to `listener` after each successful fetch
    pub fn add_listener(&self, listener: Arc<dyn FieldListener>) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(listener);
        }
    }

    pub fn fetcher(&self) -> &RemoteStateFetcher {
        &self.fetcher
    }

    /// Whether the host may ask for this field
    pub fn is_configured(&self, field: SensorField) -> bool {
        self.fetcher.is_configured(field.source())
    }

    /// Fields the host may ask for, `batteryLow` included when battery is configured
    pub fn available_fields(&self) -> Vec<SensorField> {
        [
            SensorField::Temperature,
            SensorField::Humidity,
            SensorField::Battery,
            SensorField::BatteryLow,
        ]
        .into_iter()
        .filter(|field| self.is_configured(*field))
        .collect()
    }

    /// Threshold at or below which the battery counts as low
    pub fn low_threshold(&self) -> f64 {
        self.fetcher
            .field_spec(FieldName::Battery)
            .and_then(|spec| spec.low_threshold)
            .unwrap_or(DEFAULT_BATTERY_LOW)
    }

    /// Fetch and return the current value of a field
    ///
    /// `batteryLow` is `1` when the battery level is at or below the
    /// threshold and `0` otherwise.
    pub async fn get_value(&self, field: SensorField) -> Result<Value> {
        if !self.is_configured(field) {
            return Err(SensorError::field_not_configured(field.as_str()));
        }

        let result = self.refresh().await?;
        self.field_value(&result, field)
    }

    /// [`get_value`](Self::get_value) by host-supplied field name
    pub async fn get_value_by_name(&self, field: &str) -> Result<Value> {
        self.get_value(field.parse()?).await
    }

    fn field_value(&self, result: &FetchResult, field: SensorField) -> Result<Value> {
        let value = result
            .value(field.source())
            .ok_or_else(|| SensorError::field_unavailable(field.as_str()))?;

        match field {
            SensorField::BatteryLow => {
                let level = numeric(value).ok_or_else(|| {
                    SensorError::field_unavailable(format!(
                        "{} (battery level {value} is not numeric)",
                        field.as_str()
                    ))
                })?;
                let low = level <= self.low_threshold();
                debug!("Battery level {level}, low: {low}");
                Ok(json!(if low { 1 } else { 0 }))
            }
            _ => Ok(value.clone()),
        }
    }

    /// Fetch now and record the outcome
    ///
    /// The caller always gets its own result, but the recorded outcome only
    /// moves forward: a fetch that completes after a later-started one has
    /// been recorded is not stored and not pushed.
    pub async fn refresh(&self) -> Result<Arc<FetchResult>> {
        let seq = self.begin_fetch();
        let fetched = {
            let _in_flight = InFlight::enter(&self.in_flight);
            self.fetcher.fetch().await.map(Arc::new)
        };

        if self.record(seq, &fetched).await {
            if let Ok(result) = &fetched {
                self.notify(result);
            }
        }
        fetched
    }

    fn begin_fetch(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store the outcome of fetch `seq`; false when a later fetch got there first
    async fn record(&self, seq: u64, fetched: &Result<Arc<FetchResult>>) -> bool {
        let mut outcome = self.outcome.write().await;
        if seq < outcome.seq {
            debug!(
                "Discarding outcome of fetch {}, fetch {} already recorded",
                seq, outcome.seq
            );
            return false;
        }

        outcome.seq = seq;
        match fetched {
            Ok(result) => {
                outcome.status = Some(FetchStatus::Updated);
                outcome.error = None;
                outcome.result = Some(result.clone());
            }
            Err(e) => {
                outcome.status = Some(FetchStatus::Failed);
                outcome.error = Some(e.to_string());
            }
        }
        true
    }

    fn notify(&self, result: &FetchResult) {
        let listeners = match self.listeners.lock() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return,
        };
        if listeners.is_empty() {
            return;
        }

        for field in self.available_fields() {
            match self.field_value(result, field) {
                Ok(value) => {
                    for listener in &listeners {
                        listener.update_field(field, &value);
                    }
                }
                Err(e) => debug!("Not pushing {}: {}", field, e),
            }
        }
    }

    /// `Fetching` while any request is outstanding, `Idle` otherwise
    pub fn status(&self) -> FetchStatus {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            FetchStatus::Fetching
        } else {
            FetchStatus::Idle
        }
    }

    /// `Updated` or `Failed` for the most recent completed fetch
    pub async fn last_outcome(&self) -> Option<FetchStatus> {
        self.outcome.read().await.status
    }

    /// Last successful result; kept across later failures
    pub async fn last_result(&self) -> Option<Arc<FetchResult>> {
        self.outcome.read().await.result.clone()
    }

    /// Time of the last successful fetch
    pub async fn last_update_at(&self) -> Option<DateTime<Utc>> {
        self.outcome
            .read()
            .await
            .result
            .as_ref()
            .map(|result| result.fetched_at)
    }

    /// Message of the last failed fetch, cleared by the next success
    pub async fn last_error(&self) -> Option<String> {
        self.outcome.read().await.error.clone()
    }
}

impl std::fmt::Debug for SensorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorState")
            .field("fetcher", &self.fetcher)
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .field("next_seq", &self.next_seq.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BodyCache;
    use crate::config::EndpointConfig;
    use crate::mock::{MockReply, MockTransport};
    use crate::services::models::FieldSpec;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::time::Duration;
    use url::Url;

    fn state_with(
        transport: Arc<MockTransport>,
        battery_query: Option<&str>,
        threshold: f64,
    ) -> SensorState {
        let endpoint = EndpointConfig::new(Url::parse("https://x/status").unwrap())
            .with_cache_expiration(Duration::ZERO);
        let fields = vec![
            FieldSpec::new(FieldName::Temperature, Some("reading.tempC".to_string())),
            FieldSpec::new(FieldName::Humidity, None),
            FieldSpec::battery(battery_query.map(str::to_string), threshold),
        ];
        SensorState::new(RemoteStateFetcher::new(
            endpoint,
            fields,
            transport,
            Arc::new(BodyCache::new()),
        ))
    }

    #[rstest]
    #[case(15, 1)]
    #[case(20, 1)]
    #[case(25, 0)]
    #[tokio::test]
    async fn test_battery_low_threshold(#[case] level: i64, #[case] expected: i64) {
        let transport = Arc::new(MockTransport::with_json(json!({"bat": level})));
        let state = state_with(transport, Some("bat"), 20.0);

        assert_eq!(
            state.get_value(SensorField::BatteryLow).await.unwrap(),
            json!(expected)
        );
        assert_eq!(
            state.get_value(SensorField::Battery).await.unwrap(),
            json!(level)
        );
    }

    #[tokio::test]
    async fn test_battery_low_accepts_numeric_string() {
        let transport = Arc::new(MockTransport::with_json(json!({"bat": "12.5"})));
        let state = state_with(transport, Some("bat"), 20.0);

        assert_eq!(
            state.get_value(SensorField::BatteryLow).await.unwrap(),
            json!(1)
        );
    }

    #[tokio::test]
    async fn test_battery_low_requires_numeric_level() {
        let transport = Arc::new(MockTransport::with_json(json!({"bat": "full"})));
        let state = state_with(transport, Some("bat"), 20.0);

        let err = state.get_value(SensorField::BatteryLow).await.unwrap_err();
        assert!(matches!(err, SensorError::FieldUnavailable(m) if m.contains("batteryLow")));
    }

    #[tokio::test]
    async fn test_unconfigured_field_does_not_fetch() {
        let transport = Arc::new(MockTransport::with_json(json!({"reading": {"tempC": 1}})));
        let state = state_with(transport.clone(), None, 20.0);

        for field in [
            SensorField::Humidity,
            SensorField::Battery,
            SensorField::BatteryLow,
        ] {
            let err = state.get_value(field).await.unwrap_err();
            assert!(matches!(err, SensorError::FieldNotConfigured(_)));
        }
        assert_eq!(transport.calls(), 0);
        assert_eq!(state.available_fields(), vec![SensorField::Temperature]);
    }

    #[tokio::test]
    async fn test_absent_value_is_unavailable() {
        let transport = Arc::new(MockTransport::with_json(json!({"reading": {}})));
        let state = state_with(transport, None, 20.0);

        let err = state.get_value(SensorField::Temperature).await.unwrap_err();
        assert!(matches!(err, SensorError::FieldUnavailable(_)));
        assert_eq!(state.last_outcome().await, Some(FetchStatus::Updated));
    }

    #[tokio::test]
    async fn test_failure_keeps_last_result_but_returns_error() {
        let transport = Arc::new(MockTransport::with_replies(vec![
            MockReply::Json(200, json!({"reading": {"tempC": 21.5}})),
            MockReply::Json(503, json!({})),
        ]));
        let state = state_with(transport, None, 20.0);

        assert_eq!(state.status(), FetchStatus::Idle);
        assert_eq!(state.last_outcome().await, None);
        assert_eq!(
            state.get_value(SensorField::Temperature).await.unwrap(),
            json!(21.5)
        );
        let updated_at = state.last_update_at().await;
        assert!(updated_at.is_some());

        let err = state.get_value(SensorField::Temperature).await.unwrap_err();
        assert!(err.is_fetch_error());
        assert_eq!(state.last_outcome().await, Some(FetchStatus::Failed));
        assert!(state
            .last_error()
            .await
            .is_some_and(|m| m.contains("https://x/status")));
        assert_eq!(state.last_update_at().await, updated_at);
        assert_eq!(
            state.last_result().await.unwrap().value(FieldName::Temperature),
            Some(&json!(21.5))
        );
    }

    #[tokio::test]
    async fn test_status_is_fetching_while_in_flight() {
        let transport = Arc::new(
            MockTransport::with_json(json!({"reading": {"tempC": 3}}))
                .with_delay(Duration::from_millis(100)),
        );
        let state = Arc::new(state_with(transport, None, 20.0));

        let reader = {
            let state = state.clone();
            tokio::spawn(async move { state.get_value(SensorField::Temperature).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(state.status(), FetchStatus::Fetching);

        assert_eq!(reader.await.unwrap().unwrap(), json!(3));
        assert_eq!(state.status(), FetchStatus::Idle);
        assert_eq!(state.last_outcome().await, Some(FetchStatus::Updated));
    }

    #[derive(Default)]
    struct Pushed(Mutex<Vec<(SensorField, Value)>>);

    impl FieldListener for Pushed {
        fn update_field(&self, field: SensorField, value: &Value) {
            self.0.lock().unwrap().push((field, value.clone()));
        }
    }

    #[tokio::test]
    async fn test_successful_fetch_pushes_available_values() {
        let transport = Arc::new(MockTransport::with_replies(vec![
            MockReply::Json(200, json!({"reading": {"tempC": 21.5}, "bat": 12})),
            MockReply::Json(503, json!({})),
        ]));
        let state = state_with(transport, Some("bat"), 20.0);
        let pushed = Arc::new(Pushed::default());
        state.add_listener(pushed.clone());

        state.get_value(SensorField::Temperature).await.unwrap();
        assert_eq!(
            *pushed.0.lock().unwrap(),
            vec![
                (SensorField::Temperature, json!(21.5)),
                (SensorField::Battery, json!(12)),
                (SensorField::BatteryLow, json!(1)),
            ]
        );

        assert!(state.get_value(SensorField::Temperature).await.is_err());
        assert_eq!(pushed.0.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_late_completion_does_not_overwrite_newer_outcome() {
        let transport = Arc::new(MockTransport::with_json(json!({"reading": {"tempC": 7}})));
        let state = state_with(transport, None, 20.0);
        let first = state.begin_fetch();
        let second = state.begin_fetch();

        let newer = state.fetcher().fetch().await.map(Arc::new);
        assert!(state.record(second, &newer).await);

        let older = Err(SensorError::network("https://x/status", "connection reset"));
        assert!(!state.record(first, &older).await);

        assert_eq!(state.last_outcome().await, Some(FetchStatus::Updated));
        assert_eq!(state.last_error().await, None);
        assert_eq!(
            state.last_result().await.unwrap().value(FieldName::Temperature),
            Some(&json!(7))
        );

        // A refresh started after both is recorded
        assert_eq!(
            state.get_value(SensorField::Temperature).await.unwrap(),
            json!(7)
        );
        assert_eq!(state.outcome.read().await.seq, 3);
    }

    #[tokio::test]
    async fn test_get_value_by_name() {
        let transport = Arc::new(MockTransport::with_json(json!({"reading": {"tempC": 4}})));
        let state = state_with(transport, None, 20.0);

        assert_eq!(
            state.get_value_by_name("temperature").await.unwrap(),
            json!(4)
        );
        assert!(matches!(
            state.get_value_by_name("pressure").await,
            Err(SensorError::UnknownField(_))
        ));
    }
}
