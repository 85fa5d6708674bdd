//! AMQP 1.0 Adapters
//!
//! fe2o3-amqp implementations of the transport seams:
//!
//! - [`AmqpLinkTransport`]: the transient IoT Hub connection used for
//!   redirect discovery ([`crate::connection::AmqpTransport`])
//! - [`AmqpEventSource`]: the long-lived Event Hub connection feeding the
//!   reader ([`crate::consumer::EventSource`])

mod convert;
mod event_source;
mod transport;

pub use convert::{
    body_bytes, link_failure, partition_ids_from_response, DEVICE_ID_ANNOTATION,
    ENQUEUED_TIME_ANNOTATION,
};
pub use event_source::{AmqpEventSource, SourceOptions};
pub use transport::AmqpLinkTransport;

use crate::connection::{ConnectionTranslator, EventHubConnectionString, TranslateResult};

/// Translate an IoT Hub connection string over a fresh AMQP connection
pub async fn discover_event_hub(
    translator: &ConnectionTranslator,
    iothub_connection_string: &str,
) -> TranslateResult<EventHubConnectionString> {
    let mut transport = AmqpLinkTransport::new();
    translator
        .translate(&mut transport, iothub_connection_string)
        .await
}
