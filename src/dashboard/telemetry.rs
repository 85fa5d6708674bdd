//! Telemetry payload
//!
//! The JSON shape browsers receive for every device message.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Sensor readings decoded from a device message body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IotData {
    #[serde(default, deserialize_with = "metric", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "metric", skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    /// Any other fields the device sent, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IotData {
    pub fn new(temperature: Option<f64>, humidity: Option<f64>) -> Self {
        Self {
            temperature,
            humidity,
            extra: Map::new(),
        }
    }

    /// Decode a device message body
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn has_metrics(&self) -> bool {
        self.temperature.is_some() || self.humidity.is_some()
    }
}

/// A number or numeric string; anything else reads as absent
fn metric<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    })
}

/// Message relayed to dashboards
///
/// ```json
/// {"DeviceId": "dev-1", "MessageDate": "2024-01-01T00:00:00.000Z",
///  "IotData": {"temperature": 21.5, "humidity": 40}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    #[serde(rename = "DeviceId")]
    pub device_id: String,
    #[serde(rename = "MessageDate", default)]
    pub message_date: String,
    #[serde(rename = "IotData", default)]
    pub iot_data: IotData,
}

impl TelemetryMessage {
    pub fn new(device_id: impl Into<String>, message_date: impl Into<String>, iot_data: IotData) -> Self {
        Self {
            device_id: device_id.into(),
            message_date: message_date.into(),
            iot_data,
        }
    }

    /// A date and at least one metric are required for charting
    pub fn is_recordable(&self) -> bool {
        !self.message_date.is_empty() && self.iot_data.has_metrics()
    }
}
