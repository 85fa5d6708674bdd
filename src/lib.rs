//! # Telemetry Bridge
//!
//! Reads device telemetry from an Azure IoT Hub and relays it to live
//! dashboards over WebSocket.
//!
//! ## Features
//!
//! - **Endpoint discovery**: translates an IoT Hub connection string into
//!   its Event Hub-compatible form by following the hub's AMQP redirect
//! - **Partition reader**: one task per partition, explicit start position
//! - **Live relay**: `{DeviceId, MessageDate, IotData}` frames pushed to
//!   subscribed sockets
//! - **Rolling windows**: last 50 readings per device, queryable over HTTP
//!
//! ## Modules
//!
//! - [`connection`]: connection strings, SAS tokens, redirect translation
//! - [`amqp`]: fe2o3-amqp adapters for discovery and consumption
//! - [`consumer`]: partition reader and event types
//! - [`relay`]: consumed event to dashboard message
//! - [`dashboard`]: device tracking and rolling windows
//! - [`websocket`]: connection hub and socket handler
//! - [`api`]: HTTP server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use telemetry_bridge::amqp::discover_event_hub;
//! use telemetry_bridge::connection::ConnectionTranslator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let translator = ConnectionTranslator::default();
//!     let event_hub = discover_event_hub(
//!         &translator,
//!         "HostName=myhub.azure-devices.net;SharedAccessKeyName=service;SharedAccessKey=...",
//!     )
//!     .await?;
//!
//!     println!("{}", event_hub);
//!     Ok(())
//! }
//! ```

pub mod amqp;
pub mod api;
pub mod config;
pub mod connection;
pub mod consumer;
pub mod dashboard;
pub mod relay;
pub mod websocket;

pub use connection::{
    ConnectionTranslator, EventHubConnectionString, IotHubConnectionString, SasToken,
    TranslateError, TranslateResult, TranslatorConfig,
};

pub use consumer::{
    ConsumerError, ConsumerResult, EventHandler, EventHubReader, EventPosition, ReaderConfig,
    ReceivedEvent,
};

pub use dashboard::{DeviceTracker, IotData, Reading, RecordOutcome, TelemetryMessage};

pub use relay::{Relay, RelayStatus};

pub use api::{build_router, serve, ApiError, AppState};

pub use websocket::{
    websocket_handler, ClientMessage, ConnectionHub, HubConfig, HubError, ServerMessage, WsEvent,
};

pub use config::{Config, ConfigError, LoggingConfig};
