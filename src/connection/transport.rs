//! AMQP transport seam
//!
//! The translator only needs three things from an AMQP client: open a
//! connection, attach the management link and learn how it failed, and
//! close again. Keeping that behind a trait lets the redirect logic run
//! against a scripted transport in tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::oneshot;

/// AMQP condition symbol for link redirects
pub const LINK_REDIRECT: &str = "amqp:link:redirect";

/// Default AMQPS port
pub const AMQPS_PORT: u16 = 5671;

/// Parameters for the transient IoT Hub connection
#[derive(Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    /// SASL PLAIN user name
    pub username: String,
    /// SASL PLAIN password (a SAS token)
    pub password: String,
    pub use_tls: bool,
    /// Always false for the translator; the connection is single-use
    pub reconnect: bool,
}

impl ConnectOptions {
    /// Connection URL without credentials
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "amqps" } else { "amqp" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("use_tls", &self.use_tls)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

/// Transport-neutral view of the error a link was detached or closed with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkFailure {
    /// AMQP error condition symbol, e.g. `amqp:link:redirect`
    pub condition: String,
    pub description: Option<String>,
    /// Stringified `info` map
    pub info: BTreeMap<String, String>,
}

impl LinkFailure {
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }

    pub fn is_redirect(&self) -> bool {
        self.condition.eq_ignore_ascii_case(LINK_REDIRECT)
    }
}

impl fmt::Display for LinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.condition)?;
        if let Some(description) = &self.description {
            write!(f, ": {}", description)?;
        }
        if !self.info.is_empty() {
            write!(f, " {:?}", self.info)?;
        }
        Ok(())
    }
}

/// Errors raised by a transport itself, as opposed to link failures
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self(message.to_string())
    }
}

/// Minimal AMQP client surface used by the translator
#[async_trait]
pub trait AmqpTransport: Send {
    /// Open the connection and authenticate
    async fn open(&mut self, options: &ConnectOptions) -> Result<(), TransportError>;

    /// Attach a receiving link to `address`.
    ///
    /// The returned channel resolves exactly once with the error the service
    /// reports for the link.
    async fn create_management_link(
        &mut self,
        address: &str,
    ) -> Result<oneshot::Receiver<LinkFailure>, TransportError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url() {
        let options = ConnectOptions {
            host: "myhub.azure-devices.net".to_string(),
            port: AMQPS_PORT,
            username: "u".to_string(),
            password: "secret".to_string(),
            use_tls: true,
            reconnect: false,
        };
        assert_eq!(options.url(), "amqps://myhub.azure-devices.net:5671");
        assert!(!format!("{:?}", options).contains("secret"));
    }

    #[test]
    fn test_link_failure_builder() {
        let failure = LinkFailure::new(LINK_REDIRECT)
            .with_description("redirect")
            .with_info("hostname", "eh.example.com");
        assert!(failure.is_redirect());
        assert_eq!(failure.info.get("hostname").unwrap(), "eh.example.com");
        assert!(failure.to_string().starts_with("amqp:link:redirect: redirect"));

        assert!(!LinkFailure::new("amqp:unauthorized-access").is_redirect());
    }
}
