//! Translator error types
//!
//! Defines all errors that can occur while turning an IoT Hub connection
//! string into an Event Hub-compatible one.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during connection-string translation
#[derive(Error, Debug)]
pub enum TranslateError {
    /// A required field is missing, empty, or malformed
    #[error("Invalid Azure IoT Hub connection string: {0}")]
    InvalidConnectionString(String),

    /// The hub name could not be taken from the host name
    #[error("Unable to extract the IoT Hub name from host name '{0}'")]
    NameExtraction(String),

    /// The redirect error carried no `hostname` entry
    #[error("Redirect response did not include a hostname")]
    RedirectMissingHostname,

    /// The redirect address did not contain an entity path
    #[error("Cannot parse the Event Hub name from the redirect address: {address} ({context})")]
    RedirectAddressParse { address: String, context: String },

    /// Any AMQP failure that is not the expected redirect
    #[error("AMQP protocol error: {0}")]
    Protocol(String),

    /// The service never reported the redirect
    #[error("Timed out after {0:?} waiting for the IoT Hub redirect")]
    Timeout(Duration),
}

/// Result type alias for translation operations
pub type TranslateResult<T> = Result<T, TranslateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TranslateError::NameExtraction(".azure-devices.net".to_string());
        assert_eq!(
            err.to_string(),
            "Unable to extract the IoT Hub name from host name '.azure-devices.net'"
        );

        let err = TranslateError::RedirectAddressParse {
            address: "amqps://bad".to_string(),
            context: "no port".to_string(),
        };
        assert!(err.to_string().contains("amqps://bad"));
        assert!(err.to_string().contains("no port"));
    }

    #[test]
    fn test_timeout_display() {
        let err = TranslateError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));
    }
}
