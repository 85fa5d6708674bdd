//! Device Routes
//!
//! - GET /api/v1/devices - Devices seen this session
//! - GET /api/v1/devices/:id/readings - Rolling window for one device

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{DeviceListResponse, ReadingsResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::dashboard::device_count_label;

/// GET /api/v1/devices
pub async fn list_devices(State(state): State<Arc<AppState>>) -> Json<DeviceListResponse> {
    let devices = state.tracker.devices().await;

    Json(DeviceListResponse {
        selected: devices.first().cloned(),
        label: device_count_label(devices.len()),
        devices,
    })
}

/// GET /api/v1/devices/:id/readings
pub async fn device_readings(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<ReadingsResponse>> {
    let readings = state
        .tracker
        .series(&device_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Device '{}' has not reported", device_id)))?;

    Ok(Json(ReadingsResponse {
        device_id,
        capacity: state.tracker.capacity(),
        readings,
    }))
}
