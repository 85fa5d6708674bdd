//! WebSocket Real-Time Streaming
//!
//! Pushes relayed device telemetry to dashboard clients.
//!
//! ## Architecture
//!
//! - **ConnectionHub**: Manages all active connections and subscriptions
//! - **Handler**: Handles WebSocket upgrade and message processing
//! - **Messages**: Defines client and server message formats
//!
//! ## Topics
//!
//! Clients connect to `/ws` and start subscribed to `telemetry.*` and
//! `devices`. They may narrow or widen that with subscribe/unsubscribe:
//! - `telemetry.*` - Every device
//! - `telemetry.{device}` - One device (e.g., `telemetry.sensor-01`)
//! - `devices` - Device discovery notices
//! - `system` - Bridge status notices
//!
//! ## Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:3000/ws');
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'telemetry') {
//!     console.log(msg.DeviceId, msg.MessageDate, msg.IotData.temperature);
//!   }
//! };
//! ```

mod handler;
mod hub;
mod messages;

pub use handler::websocket_handler;
pub use hub::{is_valid_topic, ConnectionHub, ConnectionId, HubConfig, HubError, DEFAULT_TOPICS};
pub use messages::{
    telemetry_topic, ClientMessage, ServerMessage, WsEvent, DEVICES_TOPIC, SYSTEM_TOPIC,
    TELEMETRY_ALL,
};
