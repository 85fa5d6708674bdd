//! Consumer event types

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single message received from an Event Hub partition
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedEvent {
    /// Raw message body
    pub body: Vec<u8>,
    /// Time the service enqueued the message
    pub enqueued_time: DateTime<Utc>,
    /// Sending device, from the `iothub-connection-device-id` annotation
    pub device_id: Option<String>,
    pub partition_id: String,
}

impl ReceivedEvent {
    pub fn new(partition_id: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            enqueued_time: Utc::now(),
            device_id: None,
            partition_id: partition_id.into(),
        }
    }

    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn enqueued_at(mut self, time: DateTime<Utc>) -> Self {
        self.enqueued_time = time;
        self
    }

    /// Enqueued time as RFC 3339 with millisecond precision
    pub fn enqueued_time_rfc3339(&self) -> String {
        self.enqueued_time.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Callback invoked once per received event
pub trait EventHandler: Send + Sync + 'static {
    fn on_event(&self, event: ReceivedEvent);
}

impl<F> EventHandler for F
where
    F: Fn(ReceivedEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: ReceivedEvent) {
        self(event)
    }
}

/// Where a new partition receiver starts reading
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPosition {
    /// Only events enqueued after the receiver attaches
    #[default]
    Latest,
    /// Everything still in retention
    Earliest,
    /// Events enqueued after the given instant
    EnqueuedAfter(DateTime<Utc>),
}

impl EventPosition {
    /// Selector expression for the `apache.org:selector-filter:string` filter
    pub fn selector(&self) -> String {
        match self {
            EventPosition::Latest => "amqp.annotation.x-opt-offset > '@latest'".to_string(),
            EventPosition::Earliest => "amqp.annotation.x-opt-offset > '-1'".to_string(),
            EventPosition::EnqueuedAfter(time) => format!(
                "amqp.annotation.x-opt-enqueued-time > '{}'",
                time.timestamp_millis()
            ),
        }
    }
}

impl fmt::Display for EventPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventPosition::Latest => write!(f, "latest"),
            EventPosition::Earliest => write!(f, "earliest"),
            EventPosition::EnqueuedAfter(time) => write!(f, "{}", time.to_rfc3339()),
        }
    }
}

impl FromStr for EventPosition {
    type Err = String;

    /// Accepts `latest`, `earliest`, or an RFC 3339 timestamp
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latest" | "" => Ok(EventPosition::Latest),
            "earliest" => Ok(EventPosition::Earliest),
            _ => DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| EventPosition::EnqueuedAfter(dt.with_timezone(&Utc)))
                .map_err(|e| format!("Invalid start position '{}': {}", s, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[test]
    fn test_selectors() {
        assert_eq!(
            EventPosition::Latest.selector(),
            "amqp.annotation.x-opt-offset > '@latest'"
        );
        assert_eq!(
            EventPosition::Earliest.selector(),
            "amqp.annotation.x-opt-offset > '-1'"
        );
        let at = Utc.timestamp_millis_opt(1_699_000_000_000).unwrap();
        assert_eq!(
            EventPosition::EnqueuedAfter(at).selector(),
            "amqp.annotation.x-opt-enqueued-time > '1699000000000'"
        );
    }

    #[test]
    fn test_position_from_str() {
        assert_eq!("latest".parse::<EventPosition>().unwrap(), EventPosition::Latest);
        assert_eq!("Earliest".parse::<EventPosition>().unwrap(), EventPosition::Earliest);
        assert!(matches!(
            "2024-01-01T00:00:00Z".parse::<EventPosition>().unwrap(),
            EventPosition::EnqueuedAfter(_)
        ));
        assert!("yesterday".parse::<EventPosition>().is_err());
    }

    #[test]
    fn test_enqueued_time_format() {
        let at = Utc.timestamp_millis_opt(1_699_000_000_123).unwrap();
        let event = ReceivedEvent::new("0", b"{}".to_vec()).enqueued_at(at);
        assert_eq!(event.enqueued_time_rfc3339(), "2023-11-03T08:26:40.123Z");
    }

    #[test]
    fn test_closure_handler() {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        let handler = move |event: ReceivedEvent| {
            sink.lock().unwrap().push(event.device_id.unwrap_or_default());
        };

        handler.on_event(ReceivedEvent::new("1", Vec::new()).device("dev-1"));
        assert_eq!(*seen.lock().unwrap(), vec!["dev-1".to_string()]);
    }
}
