//! IoT Hub → Event Hub Connection Translation
//!
//! An IoT Hub exposes its device-to-cloud stream through a built-in Event
//! Hub, but the connection string users copy from the portal only names the
//! hub. The Event Hub namespace and entity path are disclosed in exactly one
//! place: the `amqp:link:redirect` error the hub sends when a client attaches
//! to `messages/events/$management`.
//!
//! ## Flow
//!
//! 1. Parse `HostName=...;SharedAccessKeyName=...;SharedAccessKey=...`
//! 2. Sign a SAS token for `{HostName}/messages/events`
//! 3. Open a TLS AMQP connection (port 5671) as `{policy}@sas.root.{hub}`
//! 4. Attach the management link and wait (bounded) for its redirect
//! 5. Assemble `Endpoint=sb://{host}/;EntityPath={path};...`
//!
//! The AMQP client sits behind [`AmqpTransport`]; the production
//! implementation lives in [`crate::amqp`].

mod connection_string;
mod error;
mod redirect;
mod sas;
mod transport;
mod translator;

pub use connection_string::{EventHubConnectionString, IotHubConnectionString};
pub use error::{TranslateError, TranslateResult};
pub use redirect::{parse_entity_path, RedirectInfo};
pub use sas::SasToken;
pub use transport::{
    AmqpTransport, ConnectOptions, LinkFailure, TransportError, AMQPS_PORT, LINK_REDIRECT,
};
pub use translator::{ConnectionTranslator, TranslatorConfig};
