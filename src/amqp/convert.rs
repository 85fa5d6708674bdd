//! AMQP type conversions
//!
//! Pure helpers that map fe2o3-amqp types onto the crate's own types.

use chrono::{DateTime, TimeZone, Utc};
use fe2o3_amqp::types::definitions::{self, ErrorCondition, LinkError};
use fe2o3_amqp::types::messaging::annotations::OwnedKey;
use fe2o3_amqp::types::messaging::{AmqpValue, Body, MessageAnnotations};
use fe2o3_amqp::types::primitives::Value;

use crate::connection::{LinkFailure, LINK_REDIRECT};

/// Annotation carrying the service enqueue time
pub const ENQUEUED_TIME_ANNOTATION: &str = "x-opt-enqueued-time";

/// Annotation carrying the IoT Hub device id
pub const DEVICE_ID_ANNOTATION: &str = "iothub-connection-device-id";

/// Map an AMQP error onto a [`LinkFailure`]
pub fn link_failure(error: &definitions::Error) -> LinkFailure {
    let mut failure = LinkFailure::new(condition_symbol(&error.condition));
    failure.description = error.description.clone();
    if let Some(info) = &error.info {
        for (key, value) in info.iter() {
            failure.info.insert(key.0.clone(), value_to_string(value));
        }
    }
    failure
}

fn condition_symbol(condition: &ErrorCondition) -> String {
    match condition {
        ErrorCondition::LinkError(LinkError::Redirect) => LINK_REDIRECT.to_string(),
        ErrorCondition::Custom(symbol) => symbol.0.clone(),
        other => format!("{:?}", other),
    }
}

/// Render a primitive for logs and info maps
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Symbol(s) => s.0.clone(),
        other => format!("{:?}", other),
    }
}

/// Flatten a message body into bytes.
///
/// IoT Hub telemetry arrives as one or more Data sections; string and
/// binary AMQP values are accepted as well.
pub fn body_bytes(body: &Body<Value>) -> Vec<u8> {
    match body {
        Body::Data(sections) => sections
            .iter()
            .flat_map(|data| data.0.iter().copied())
            .collect(),
        Body::Value(AmqpValue(Value::String(s))) => s.clone().into_bytes(),
        Body::Value(AmqpValue(Value::Binary(b))) => b.to_vec(),
        _ => Vec::new(),
    }
}

fn annotation<'a>(annotations: &'a MessageAnnotations, name: &str) -> Option<&'a Value> {
    annotations.0.iter().find_map(|(key, value)| match key {
        OwnedKey::Symbol(symbol) if symbol.0 == name => Some(value),
        _ => None,
    })
}

/// Enqueued time annotation, if present
pub fn enqueued_time(annotations: Option<&MessageAnnotations>) -> Option<DateTime<Utc>> {
    match annotations.and_then(|a| annotation(a, ENQUEUED_TIME_ANNOTATION))? {
        Value::Timestamp(ts) => Utc.timestamp_millis_opt(ts.milliseconds()).single(),
        Value::Long(ms) => Utc.timestamp_millis_opt(*ms).single(),
        _ => None,
    }
}

/// Device id annotation, if present
pub fn device_id(annotations: Option<&MessageAnnotations>) -> Option<String> {
    match annotations.and_then(|a| annotation(a, DEVICE_ID_ANNOTATION))? {
        Value::String(s) => Some(s.clone()),
        Value::Symbol(s) => Some(s.0.clone()),
        _ => None,
    }
}

/// `partition_ids` from an Event Hubs management READ response
pub fn partition_ids_from_response(body: &Value) -> Option<Vec<String>> {
    let Value::Map(map) = body else {
        return None;
    };

    let ids = map.iter().find_map(|(key, value)| match key {
        Value::String(k) if k == "partition_ids" => Some(value),
        Value::Symbol(k) if k.0 == "partition_ids" => Some(value),
        _ => None,
    })?;

    let items: Vec<&Value> = match ids {
        Value::Array(array) => array.0.iter().collect(),
        Value::List(list) => list.iter().collect(),
        _ => return None,
    };

    Some(items.into_iter().map(value_to_string).collect())
}
