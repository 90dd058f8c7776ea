//! Console host used by the `watch` command
//!
//! Emulates a host scheduler: every published field is read on a fixed
//! interval and the outcome is written to stdout. Pushed values are logged.

use super::{CharacteristicProps, FieldListener, FieldReader, HostAdapter};
use crate::config::AccessoryInformation;
use crate::error::Result;
use crate::services::SensorField;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

struct Published {
    field: SensorField,
    props: CharacteristicProps,
    reader: Arc<dyn FieldReader>,
}

/// One read of one field
#[derive(Debug)]
pub struct Reading {
    pub field: SensorField,
    pub outcome: Result<Value>,
}

impl Reading {
    /// `name: value unit` or `name: error`
    pub fn render(&self, props: Option<&CharacteristicProps>) -> String {
        match &self.outcome {
            Ok(value) => match props.and_then(|p| p.unit) {
                Some(unit) => format!("{}: {} {}", self.field, value, unit),
                None => format!("{}: {}", self.field, value),
            },
            Err(e) => format!("{}: error: {}", self.field, e),
        }
    }
}

/// Logs values pushed after each fetch
struct PushLog;

impl FieldListener for PushLog {
    fn update_field(&self, field: SensorField, value: &Value) {
        debug!("Pushed {} = {}", field, value);
    }
}

/// Host adapter that polls from the terminal
#[derive(Default)]
pub struct ConsoleHost {
    information: Option<AccessoryInformation>,
    fields: Vec<Published>,
}

impl ConsoleHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every published field concurrently
    pub async fn poll_once(&self) -> Vec<Reading> {
        join_all(self.fields.iter().map(|published| async move {
            let outcome = published.reader.read().await;
            if let Err(e) = &outcome {
                debug!("Read of {} failed: {}", published.field, e);
            }
            Reading {
                field: published.field,
                outcome,
            }
        }))
        .await
    }

    /// Print one poll to stdout
    pub async fn print_once(&self) {
        let name = self
            .information
            .as_ref()
            .map(|i| i.name.as_str())
            .unwrap_or("accessory");
        let readings = self.poll_once().await;
        let line = readings
            .iter()
            .map(|reading| reading.render(self.props(reading.field)))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{} [{}] {}",
            chrono::Local::now().format("%H:%M:%S"),
            name,
            line
        );
    }

    /// Poll on `interval` until Ctrl+C
    pub async fn run(&self, interval: Duration) -> Result<()> {
        if self.fields.is_empty() {
            warn!("No fields published, nothing to watch");
            return Ok(());
        }

        info!(
            "Watching {} field(s) every {:?}",
            self.fields.len(),
            interval
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.print_once().await,
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, stopping watch");
                    break;
                }
            }
        }

        Ok(())
    }

    fn props(&self, field: SensorField) -> Option<&CharacteristicProps> {
        self.fields
            .iter()
            .find(|p| p.field == field)
            .map(|p| &p.props)
    }
}

impl HostAdapter for ConsoleHost {
    fn publish_information(&mut self, information: &AccessoryInformation) -> Result<()> {
        info!(
            "Accessory {} ({} {}, serial '{}')",
            information.name, information.manufacturer, information.model, information.serial
        );
        self.information = Some(information.clone());
        Ok(())
    }

    fn publish_field(
        &mut self,
        field: SensorField,
        props: CharacteristicProps,
        reader: Arc<dyn FieldReader>,
    ) -> Result<()> {
        self.fields.push(Published {
            field,
            props,
            reader,
        });
        Ok(())
    }

    fn field_listener(&self) -> Option<Arc<dyn FieldListener>> {
        Some(Arc::new(PushLog))
    }
}
