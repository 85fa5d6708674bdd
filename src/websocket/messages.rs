//! WebSocket Message Types
//!
//! Defines all message types for WebSocket communication between
//! dashboards and the bridge.

use serde::{Deserialize, Serialize};

use crate::dashboard::TelemetryMessage;

/// Topic carrying every device's telemetry
pub const TELEMETRY_ALL: &str = "telemetry.*";
/// Topic carrying device discovery notices
pub const DEVICES_TOPIC: &str = "devices";
/// Topic carrying bridge status notices
pub const SYSTEM_TOPIC: &str = "system";

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to topics for real-time updates
    Subscribe {
        /// List of topics to subscribe to (e.g., "telemetry.dev-1", "telemetry.*")
        topics: Vec<String>,
    },
    /// Unsubscribe from topics
    Unsubscribe {
        topics: Vec<String>,
    },
    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A device message, relayed as-is with the wire field names intact
    Telemetry(TelemetryMessage),
    /// First message seen from a device this session
    DeviceDiscovered {
        device_id: String,
        device_count: usize,
    },
    /// Subscription confirmed
    Subscribed {
        topics: Vec<String>,
    },
    /// Unsubscription confirmed
    Unsubscribed {
        topics: Vec<String>,
    },
    /// Pong response to ping
    Pong,
    /// Bridge status notice
    System {
        message: String,
    },
    /// Error message
    Error {
        message: String,
    },
    /// Connection established
    Connected {
        /// Unique connection identifier
        connection_id: String,
    },
}

/// Internal event for broadcasting through the hub
#[derive(Debug, Clone)]
pub struct WsEvent {
    /// Topic this event belongs to (e.g., "telemetry.dev-1")
    pub topic: String,
    /// The message to send to subscribers
    pub message: ServerMessage,
}

impl WsEvent {
    /// Telemetry from one device, published on `telemetry.<device>`
    pub fn telemetry(message: TelemetryMessage) -> Self {
        Self {
            topic: telemetry_topic(&message.device_id),
            message: ServerMessage::Telemetry(message),
        }
    }

    /// Create a device discovery event
    pub fn device_discovered(device_id: &str, device_count: usize) -> Self {
        Self {
            topic: DEVICES_TOPIC.to_string(),
            message: ServerMessage::DeviceDiscovered {
                device_id: device_id.to_string(),
                device_count,
            },
        }
    }

    /// Create a system event
    pub fn system(message: &str) -> Self {
        Self {
            topic: SYSTEM_TOPIC.to_string(),
            message: ServerMessage::System {
                message: message.to_string(),
            },
        }
    }
}

pub fn telemetry_topic(device_id: &str) -> String {
    format!("telemetry.{}", device_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::IotData;

    #[test]
    fn test_client_message_deserialize_subscribe() {
        let json = r#"{"type": "subscribe", "topics": ["telemetry.dev-1", "devices"]}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Subscribe { topics } => {
                assert_eq!(topics.len(), 2);
                assert_eq!(topics[0], "telemetry.dev-1");
            }
            _ => panic!("Expected Subscribe"),
        }
    }

    #[test]
    fn test_client_message_deserialize_ping() {
        let json = r#"{"type": "ping"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_server_message_serialize_telemetry() {
        let msg = ServerMessage::Telemetry(TelemetryMessage::new(
            "dev-1",
            "2024-01-01T00:00:00.000Z",
            IotData::new(Some(21.5), Some(40.0)),
        ));
        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "telemetry");
        assert_eq!(value["DeviceId"], "dev-1");
        assert_eq!(value["MessageDate"], "2024-01-01T00:00:00.000Z");
        assert_eq!(value["IotData"]["temperature"], 21.5);
        assert_eq!(value["IotData"]["humidity"], 40.0);
    }

    #[test]
    fn test_server_message_serialize_connected() {
        let msg = ServerMessage::Connected {
            connection_id: "abc-123".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("\"connection_id\":\"abc-123\""));
    }

    #[test]
    fn test_ws_event_topics() {
        let event = WsEvent::telemetry(TelemetryMessage::new("dev-9", "t", IotData::default()));
        assert_eq!(event.topic, "telemetry.dev-9");

        let event = WsEvent::device_discovered("dev-9", 3);
        assert_eq!(event.topic, "devices");
        match event.message {
            ServerMessage::DeviceDiscovered { device_id, device_count } => {
                assert_eq!(device_id, "dev-9");
                assert_eq!(device_count, 3);
            }
            _ => panic!("Expected DeviceDiscovered"),
        }

        assert_eq!(WsEvent::system("up").topic, "system");
    }
}
