//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::dashboard::DeviceTracker;
use crate::relay::RelayStatus;
use crate::websocket::{ConnectionHub, HubConfig};

pub use crate::config::ApiConfig;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    /// WebSocket connection hub for real-time streaming
    pub ws_hub: Arc<ConnectionHub>,
    /// Devices and rolling windows fed by the relay
    pub tracker: Arc<DeviceTracker>,
    /// Consume-and-relay pipeline state, written by the pipeline task
    pub relay_status: Arc<RwLock<RelayStatus>>,
}

impl AppState {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_components(config, HubConfig::default(), DeviceTracker::default())
    }

    pub fn with_components(config: ApiConfig, hub_config: HubConfig, tracker: DeviceTracker) -> Self {
        Self {
            config: Arc::new(config),
            start_time: Instant::now(),
            ws_hub: Arc::new(ConnectionHub::new(hub_config)),
            tracker: Arc::new(tracker),
            relay_status: Arc::new(RwLock::new(RelayStatus::Starting)),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn ws_connection_count(&self) -> usize {
        self.ws_hub.connection_count().await
    }

    pub async fn set_relay_status(&self, status: RelayStatus) {
        *self.relay_status.write().await = status;
    }

    pub async fn relay_status(&self) -> RelayStatus {
        self.relay_status.read().await.clone()
    }
}
