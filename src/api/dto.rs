//! Data Transfer Objects
//!
//! Response types for the API endpoints.

use serde::{Deserialize, Serialize};

use crate::dashboard::Reading;
use crate::relay::RelayStatus;

// ============================================
// DEVICE DTOs
// ============================================

/// Devices seen this session
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceListResponse {
    /// Device ids in first-seen order
    pub devices: Vec<String>,
    /// Device a fresh dashboard shows first
    pub selected: Option<String>,
    /// "1 device" / "N devices"
    pub label: String,
}

/// Rolling window for one device
#[derive(Debug, Serialize)]
pub struct ReadingsResponse {
    pub device_id: String,
    pub capacity: usize,
    /// Oldest first
    pub readings: Vec<Reading>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, degraded, unhealthy
    pub status: String,
    pub relay: RelayStatus,
    /// Open WebSocket connections
    pub connections: usize,
    /// Devices seen this session
    pub devices: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
