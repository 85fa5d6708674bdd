//! Telemetry Relay
//!
//! Turns consumed Event Hub messages into dashboard telemetry: decode the
//! body, stamp it with device and enqueued time, record it in the tracker
//! and push it to subscribed sockets.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::consumer::ReceivedEvent;
use crate::dashboard::{DeviceTracker, IotData, RecordOutcome, TelemetryMessage};
use crate::websocket::{ConnectionHub, WsEvent};

/// Device id used when a message carries no device annotation
pub const UNKNOWN_DEVICE: &str = "unknown";

/// What happened to one consumed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Body was not a JSON object
    Malformed,
    Relayed(RecordOutcome),
}

/// Lifecycle of the consume-and-relay pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RelayStatus {
    #[default]
    Starting,
    Running {
        entity_path: String,
        partitions: Vec<String>,
    },
    Failed {
        error: String,
    },
    Stopped,
}

impl RelayStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, RelayStatus::Running { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelayStatus::Starting => "starting",
            RelayStatus::Running { .. } => "running",
            RelayStatus::Failed { .. } => "failed",
            RelayStatus::Stopped => "stopped",
        }
    }
}

pub struct Relay {
    tracker: Arc<DeviceTracker>,
    hub: Arc<ConnectionHub>,
}

impl Relay {
    pub fn new(tracker: Arc<DeviceTracker>, hub: Arc<ConnectionHub>) -> Self {
        Self { tracker, hub }
    }

    /// Build the dashboard message for a consumed event
    pub fn to_telemetry(event: &ReceivedEvent) -> Result<TelemetryMessage, serde_json::Error> {
        let iot_data = IotData::from_body(&event.body)?;
        let device_id = event
            .device_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| UNKNOWN_DEVICE.to_string());

        Ok(TelemetryMessage::new(
            device_id,
            event.enqueued_time_rfc3339(),
            iot_data,
        ))
    }

    /// Relay one consumed event
    pub async fn handle_event(&self, event: ReceivedEvent) -> RelayOutcome {
        let message = match Self::to_telemetry(&event) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(
                    partition_id = %event.partition_id,
                    error = %e,
                    "Dropping non-JSON telemetry"
                );
                return RelayOutcome::Malformed;
            }
        };

        let outcome = self.tracker.record(&message).await;
        if outcome == RecordOutcome::NewDevice {
            let count = self.tracker.device_count().await;
            self.hub
                .broadcast(&WsEvent::device_discovered(&message.device_id, count))
                .await;
        }

        let device_id = message.device_id.clone();
        let sent = self.hub.broadcast(&WsEvent::telemetry(message)).await;
        tracing::trace!(device_id = %device_id, subscribers = sent, "Relayed telemetry");

        RelayOutcome::Relayed(outcome)
    }

    /// Drain events until every sender is dropped
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<ReceivedEvent>) {
        let mut relayed: u64 = 0;
        while let Some(event) = events.recv().await {
            if let RelayOutcome::Relayed(_) = self.handle_event(event).await {
                relayed += 1;
            }
        }
        tracing::info!(relayed, "Relay stopped");
    }
}
