//! Host framework integration
//!
//! A host (a smart-home bridge, the console watcher) learns about an
//! accessory through [`HostAdapter`]: static information once, then one
//! published characteristic per configured field, each with a reader the
//! host calls whenever it wants the current value. Hosts that want values
//! pushed to them after every successful fetch hand out a [`FieldListener`].

pub mod console;

pub use console::ConsoleHost;
pub use crate::services::FieldListener;

use crate::accessory::Accessory;
use crate::config::AccessoryInformation;
use crate::error::Result;
use crate::services::{SensorField, SensorState};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Value constraints of a published characteristic
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacteristicProps {
    pub min_value: f64,
    pub max_value: f64,
    pub min_step: f64,
    pub unit: Option<&'static str>,
}

impl CharacteristicProps {
    pub fn for_field(field: SensorField) -> Self {
        match field {
            SensorField::Temperature => Self {
                min_value: -273.0,
                max_value: 200.0,
                min_step: 0.1,
                unit: Some("celsius"),
            },
            SensorField::Humidity | SensorField::Battery => Self {
                min_value: 0.0,
                max_value: 100.0,
                min_step: 1.0,
                unit: Some("percentage"),
            },
            SensorField::BatteryLow => Self {
                min_value: 0.0,
                max_value: 1.0,
                min_step: 1.0,
                unit: None,
            },
        }
    }
}

/// Async getter handed to the host for one characteristic
#[async_trait]
pub trait FieldReader: Send + Sync {
    fn field(&self) -> SensorField;

    async fn read(&self) -> Result<Value>;
}

/// Reader backed by a [`SensorState`]
#[derive(Debug, Clone)]
pub struct StateReader {
    state: Arc<SensorState>,
    field: SensorField,
}

impl StateReader {
    pub fn new(state: Arc<SensorState>, field: SensorField) -> Self {
        Self { state, field }
    }
}

#[async_trait]
impl FieldReader for StateReader {
    fn field(&self) -> SensorField {
        self.field
    }

    async fn read(&self) -> Result<Value> {
        self.state.get_value(self.field).await
    }
}

/// Host-side registration surface
pub trait HostAdapter {
    fn publish_information(&mut self, information: &AccessoryInformation) -> Result<()>;

    fn publish_field(
        &mut self,
        field: SensorField,
        props: CharacteristicProps,
        reader: Arc<dyn FieldReader>,
    ) -> Result<()>;

    /// Listener for pushed values; `None` when the host only reads
    fn field_listener(&self) -> Option<Arc<dyn FieldListener>> {
        None
    }
}

/// Publish the accessory and every configured field; returns the number of
/// published fields
pub fn register_accessory<H: HostAdapter + ?Sized>(
    host: &mut H,
    accessory: &Accessory,
) -> Result<usize> {
    host.publish_information(accessory.information())?;

    let state = accessory.state();
    let fields = state.available_fields();
    for field in &fields {
        debug!("Publishing {} for {}", field, accessory.information().name);
        host.publish_field(
            *field,
            CharacteristicProps::for_field(*field),
            Arc::new(StateReader::new(state.clone(), *field)),
        )?;
    }

    if let Some(listener) = host.field_listener() {
        state.add_listener(listener);
    }

    Ok(fields.len())
}
