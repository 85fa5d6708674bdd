//! Consumer error types

use thiserror::Error;

use crate::connection::TranslateError;

/// Errors that can occur while consuming from an Event Hub
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// Connection could not be established or was lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// Management request (partition discovery) failed
    #[error("Management request failed: {0}")]
    Management(String),

    /// A single receive failed; the link is still usable
    #[error("Receive error: {0}")]
    Receive(String),

    /// The partition link was detached or closed by the service
    #[error("Link closed: {0}")]
    LinkClosed(String),

    /// The reader is already running
    #[error("Reader already started")]
    AlreadyStarted,

    /// The reader was stopped and its source closed
    #[error("Reader stopped")]
    Stopped,

    /// No partition could be subscribed
    #[error("No partitions available to subscribe")]
    NoPartitions,

    /// The Event Hub connection string is unusable
    #[error(transparent)]
    ConnectionString(#[from] TranslateError),
}

impl ConsumerError {
    /// Whether the receiving loop for a partition must end
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConsumerError::Connection(_) | ConsumerError::LinkClosed(_)
        )
    }
}

/// Result type alias for consumer operations
pub type ConsumerResult<T> = Result<T, ConsumerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ConsumerError::LinkClosed("detached".into()).is_fatal());
        assert!(ConsumerError::Connection("reset".into()).is_fatal());
        assert!(!ConsumerError::Receive("decode".into()).is_fatal());
        assert!(!ConsumerError::NoPartitions.is_fatal());
        assert!(!ConsumerError::Stopped.is_fatal());
    }
}
