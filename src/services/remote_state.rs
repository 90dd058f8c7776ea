//! Remote state fetcher
//!
//! Issues the configured request (or answers it from the response cache)
//! and runs every configured field query over the body. All fields are
//! refreshed together; a failing query only blanks its own field.

use crate::cache::{BodyCache, RequestFingerprint};
use crate::client::{HttpTransport, TransportRequest};
use crate::config::EndpointConfig;
use crate::error::{Result, SensorError};
use crate::query::{Query, QueryError};
use crate::services::models::{FetchResult, FieldName, FieldSpec};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A field spec with its query parsed up front
#[derive(Debug)]
struct CompiledField {
    spec: FieldSpec,
    query: std::result::Result<Query, QueryError>,
}

impl CompiledField {
    fn evaluate(&self, body: &Value) -> Option<Value> {
        let expression = self.spec.query.as_deref().unwrap_or_default();
        let outcome = match &self.query {
            Ok(query) => query.evaluate(body),
            Err(e) => Err(e.clone()),
        };

        match outcome {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                debug!(
                    "Query for {} matched nothing: {}",
                    self.spec.name, expression
                );
                None
            }
            Err(e) => {
                warn!(
                    "{} ({} left without a value)",
                    SensorError::query(expression, e.to_string()),
                    self.spec.name
                );
                None
            }
        }
    }
}

/// Fetches the endpoint and extracts field values
pub struct RemoteStateFetcher {
    endpoint: EndpointConfig,
    fields: Vec<CompiledField>,
    transport: Arc<dyn HttpTransport>,
    cache: Arc<BodyCache>,
    request: TransportRequest,
    fingerprint: RequestFingerprint,

    /// Held while a network call is outstanding, so concurrent misses wait
    /// for it and then read the cache instead of issuing their own call
    refresh_lock: Mutex<()>,
}

impl RemoteStateFetcher {
    /// Create a fetcher; only enabled fields take part in extraction
    pub fn new(
        endpoint: EndpointConfig,
        fields: Vec<FieldSpec>,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<BodyCache>,
    ) -> Self {
        let fields = fields
            .into_iter()
            .filter_map(|spec| {
                let query = Query::parse(spec.query.as_deref()?);
                if let Err(e) = &query {
                    warn!(
                        "Query for {} cannot be parsed and will never yield a value: {}",
                        spec.name, e
                    );
                }
                Some(CompiledField { spec, query })
            })
            .collect();

        let request = TransportRequest::json(endpoint.method.clone(), endpoint.url.clone());
        let fingerprint = RequestFingerprint::new(
            request.method.as_str(),
            request.url.as_str(),
            &request.headers,
        );

        Self {
            endpoint,
            fields,
            transport,
            cache,
            request,
            fingerprint,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    pub fn fingerprint(&self) -> &RequestFingerprint {
        &self.fingerprint
    }

    /// Whether a query is configured for the field
    pub fn is_configured(&self, field: FieldName) -> bool {
        self.field_spec(field).is_some()
    }

    /// Spec of a configured field
    pub fn field_spec(&self, field: FieldName) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.spec.name == field)
            .map(|f| &f.spec)
    }

    /// Names of the configured fields
    pub fn configured_fields(&self) -> Vec<FieldName> {
        self.fields.iter().map(|f| f.spec.name).collect()
    }

    /// Fetch the endpoint (or the cached body) and extract every field
    pub async fn fetch(&self) -> Result<FetchResult> {
        let caching = !self.endpoint.cache_expiration.is_zero();

        if caching {
            if let Some(body) = self.cache.get(&self.fingerprint).await {
                debug!("Cache hit ({})", self.fingerprint.short());
                return Ok(self.extract(&body, true));
            }
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed the cache while we waited
        if caching {
            if let Some(body) = self.cache.get(&self.fingerprint).await {
                debug!("Cache filled while waiting ({})", self.fingerprint.short());
                return Ok(self.extract(&body, true));
            }
        }

        let body = self.request_body().await?;
        self.cache
            .put(
                self.fingerprint.clone(),
                body.clone(),
                self.endpoint.cache_expiration,
            )
            .await;
        info!("HTTP success ({})", self.fingerprint.short());

        Ok(self.extract(&body, false))
    }

    async fn request_body(&self) -> Result<Arc<Value>> {
        let url = self.endpoint.url.as_str();

        let response = match self.transport.execute(&self.request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("HTTP failure ({url}): {e}");
                return Err(e);
            }
        };

        if !response.is_success() {
            warn!("HTTP failure ({url}): status {}", response.status);
            return Err(SensorError::http_status(url, response.status));
        }

        let body: Value = serde_json::from_slice(&response.body).map_err(|e| {
            warn!("HTTP failure ({url}): body is not JSON");
            SensorError::invalid_body(url, e.to_string())
        })?;

        Ok(Arc::new(body))
    }

    fn extract(&self, body: &Value, from_cache: bool) -> FetchResult {
        let values: BTreeMap<FieldName, Option<Value>> = self
            .fields
            .iter()
            .map(|field| (field.spec.name, field.evaluate(body)))
            .collect();

        FetchResult {
            fingerprint: self.fingerprint.clone(),
            fetched_at: chrono::Utc::now(),
            from_cache,
            values,
        }
    }
}

impl std::fmt::Debug for RemoteStateFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStateFetcher")
            .field("url", &self.endpoint.url.as_str())
            .field("method", &self.endpoint.method)
            .field("fields", &self.configured_fields())
            .field("fingerprint", &self.fingerprint.short())
            .finish()
    }
}
