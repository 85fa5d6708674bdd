//! Device Tracker
//!
//! Every device that has sent chartable telemetry this session, in the order
//! it first appeared, with its rolling window.

use std::collections::HashMap;
use tokio::sync::RwLock;

use super::telemetry::TelemetryMessage;
use super::window::{DeviceSeries, Reading, DEFAULT_WINDOW_CAPACITY};

/// Result of recording a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Missing date or metrics
    Dropped,
    /// First message from this device
    NewDevice,
    Appended,
}

#[derive(Default)]
struct TrackerState {
    /// Append-only, first-seen order
    order: Vec<String>,
    series: HashMap<String, DeviceSeries>,
}

/// Session-wide device list and per-device windows
pub struct DeviceTracker {
    capacity: usize,
    state: RwLock<TrackerState>,
}

impl Default for DeviceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl DeviceTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: RwLock::new(TrackerState::default()),
        }
    }

    /// Record a telemetry message
    pub async fn record(&self, message: &TelemetryMessage) -> RecordOutcome {
        if !message.is_recordable() {
            return RecordOutcome::Dropped;
        }

        let reading = Reading {
            time: message.message_date.clone(),
            temperature: message.iot_data.temperature,
            humidity: message.iot_data.humidity,
        };

        let mut state = self.state.write().await;
        if let Some(series) = state.series.get_mut(&message.device_id) {
            series.push(reading);
            return RecordOutcome::Appended;
        }

        let mut series = DeviceSeries::new(message.device_id.clone(), self.capacity);
        series.push(reading);
        state.order.push(message.device_id.clone());
        state.series.insert(message.device_id.clone(), series);

        tracing::info!(
            device_id = %message.device_id,
            devices = state.order.len(),
            "New device discovered"
        );
        RecordOutcome::NewDevice
    }

    /// Device ids in first-seen order
    pub async fn devices(&self) -> Vec<String> {
        self.state.read().await.order.clone()
    }

    pub async fn device_count(&self) -> usize {
        self.state.read().await.order.len()
    }

    /// The device a fresh dashboard shows first
    pub async fn selected_device(&self) -> Option<String> {
        self.state.read().await.order.first().cloned()
    }

    /// Readings for a device, oldest first
    pub async fn series(&self, device_id: &str) -> Option<Vec<Reading>> {
        self.state
            .read()
            .await
            .series
            .get(device_id)
            .map(|s| s.readings().cloned().collect())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// "1 device" / "N devices"
pub fn device_count_label(count: usize) -> String {
    if count == 1 {
        "1 device".to_string()
    } else {
        format!("{} devices", count)
    }
}
