//! Data model shared by the fetcher, the facade and host adapters

use crate::cache::RequestFingerprint;
use crate::error::SensorError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Quantity extracted from the endpoint by a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldName {
    Temperature,
    Humidity,
    Battery,
}

impl FieldName {
    pub const ALL: [FieldName; 3] = [
        FieldName::Temperature,
        FieldName::Humidity,
        FieldName::Battery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Temperature => "temperature",
            FieldName::Humidity => "humidity",
            FieldName::Battery => "battery",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field a host can ask for; `BatteryLow` is derived from `Battery`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SensorField {
    Temperature,
    Humidity,
    Battery,
    BatteryLow,
}

impl SensorField {
    /// The extracted field this one is read from
    pub fn source(&self) -> FieldName {
        match self {
            SensorField::Temperature => FieldName::Temperature,
            SensorField::Humidity => FieldName::Humidity,
            SensorField::Battery | SensorField::BatteryLow => FieldName::Battery,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorField::Temperature => "temperature",
            SensorField::Humidity => "humidity",
            SensorField::Battery => "battery",
            SensorField::BatteryLow => "batteryLow",
        }
    }
}

impl fmt::Display for SensorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorField {
    type Err = SensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "temperature" => Ok(SensorField::Temperature),
            "humidity" => Ok(SensorField::Humidity),
            "battery" => Ok(SensorField::Battery),
            "batterylow" => Ok(SensorField::BatteryLow),
            _ => Err(SensorError::UnknownField(s.to_string())),
        }
    }
}

/// One monitored quantity and the query that extracts it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: FieldName,

    /// Query expression; `None` disables the field
    pub query: Option<String>,

    /// Low-battery threshold, battery only
    pub low_threshold: Option<f64>,
}

impl FieldSpec {
    pub fn new(name: FieldName, query: Option<String>) -> Self {
        Self {
            name,
            query,
            low_threshold: None,
        }
    }

    pub fn battery(query: Option<String>, low_threshold: f64) -> Self {
        Self {
            name: FieldName::Battery,
            query,
            low_threshold: Some(low_threshold),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.query.is_some()
    }
}

/// Outcome of one successful fetch; replaces the previous one entirely
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub fingerprint: RequestFingerprint,

    pub fetched_at: chrono::DateTime<chrono::Utc>,

    /// Whether the body came from the response cache
    pub from_cache: bool,

    /// Extracted value per configured field; `None` when the query matched nothing
    pub values: BTreeMap<FieldName, Option<Value>>,
}

impl FetchResult {
    /// Extracted value of a configured field, if any
    pub fn value(&self, field: FieldName) -> Option<&Value> {
        self.values.get(&field).and_then(Option::as_ref)
    }
}

/// Per-accessory fetch state: `Idle -> Fetching -> {Updated | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Idle,
    Fetching,
    Updated,
    Failed,
}

/// Numeric reading of a scalar; numeric strings are accepted
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}
