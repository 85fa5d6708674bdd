//! Event source seam
//!
//! The reader drives any [`EventSource`]; the AMQP-backed implementation is
//! [`crate::amqp::AmqpEventSource`].

use async_trait::async_trait;

use super::error::ConsumerResult;
use super::event::{EventPosition, ReceivedEvent};

/// A partitioned stream of events
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    /// Partition ids of the Event Hub
    async fn partition_ids(&self) -> ConsumerResult<Vec<String>>;

    /// Attach a receiver to one partition for a consumer group
    async fn open_partition(
        &self,
        partition_id: &str,
        consumer_group: &str,
        position: &EventPosition,
    ) -> ConsumerResult<Box<dyn PartitionReceiver>>;

    /// Release the underlying connection
    async fn close(&self) -> ConsumerResult<()>;
}

/// Receiver bound to a single partition
#[async_trait]
pub trait PartitionReceiver: Send {
    fn partition_id(&self) -> &str;

    /// Wait for the next batch of events
    async fn receive(&mut self) -> ConsumerResult<Vec<ReceivedEvent>>;

    async fn close(&mut self) -> ConsumerResult<()>;
}
