//! Dashboard State
//!
//! Server-side mirror of what the browser charts: which devices have
//! reported, which one is shown first, and a bounded window of recent
//! temperature/humidity readings for each.

mod telemetry;
mod tracker;
mod window;

pub use telemetry::{IotData, TelemetryMessage};
pub use tracker::{device_count_label, DeviceTracker, RecordOutcome};
pub use window::{DeviceSeries, Reading, DEFAULT_WINDOW_CAPACITY};
