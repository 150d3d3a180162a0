// Telemetry ingest - Host bridge messages into the reactive store
use crate::application::rate_monitor::RateMonitor;
use crate::application::state_store::ReactiveStore;
use crate::domain::telemetry::{TelemetryError, TelemetryRecord};
use serde_json::Value;
use std::sync::Arc;

/// A message as delivered by the host bridge.
#[derive(Debug, Clone)]
pub enum RawMessage {
    Text(String),
    Json(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Published,
    InvalidJson,
    Malformed,
}

#[derive(Clone)]
pub struct TelemetryIngest {
    store: Arc<ReactiveStore>,
    rate: RateMonitor,
}

impl TelemetryIngest {
    pub fn new(store: Arc<ReactiveStore>, rate: RateMonitor) -> Self {
        Self { store, rate }
    }

    /// Parse, validate and publish. Bad input is logged and dropped; the
    /// current record is left untouched.
    pub fn ingest(&self, raw: RawMessage) -> IngestOutcome {
        let parsed = match raw {
            RawMessage::Text(text) => {
                self.rate.record(text.len());
                TelemetryRecord::from_json(&text)
            }
            RawMessage::Json(value) => {
                self.rate.record(value.to_string().len());
                TelemetryRecord::from_value(value)
            }
        };

        match parsed {
            Ok(record) => {
                tracing::debug!(
                    system_id = %record.system_id,
                    heart_status = %record.heart_status,
                    "Publishing telemetry record"
                );
                self.store.publish(record);
                IngestOutcome::Published
            }
            Err(TelemetryError::InvalidJson(e)) => {
                tracing::warn!("Dropping telemetry message that is not valid JSON: {}", e);
                IngestOutcome::InvalidJson
            }
            Err(e) => {
                tracing::warn!("Dropping malformed telemetry record: {}", e);
                IngestOutcome::Malformed
            }
        }
    }
}
