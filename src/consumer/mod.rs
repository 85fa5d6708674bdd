//! Event Hub Consumer
//!
//! Reads device telemetry from the Event Hub-compatible endpoint of an IoT
//! Hub.
//!
//! ## Architecture
//!
//! - **EventSource**: partition discovery and per-partition receivers
//! - **EventHubReader**: one task per partition, feeding an [`EventHandler`]
//! - **ReceivedEvent**: body, enqueued time and source device of a message
//!
//! Receive errors are logged and never retried here; a partition whose link
//! is closed by the service stays stopped until the reader is restarted.

mod error;
mod event;
mod reader;
mod source;

pub use error::{ConsumerError, ConsumerResult};
pub use event::{EventHandler, EventPosition, ReceivedEvent};
pub use reader::{EventHubReader, ReaderConfig};
pub use source::{EventSource, PartitionReceiver};
