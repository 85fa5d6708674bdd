//! Connection-String Translator
//!
//! Turns an IoT Hub connection string into an Event Hub-compatible one by
//! asking the hub for its `$management` link and reading where it redirects.

use std::time::Duration;

use super::connection_string::{EventHubConnectionString, IotHubConnectionString};
use super::error::{TranslateError, TranslateResult};
use super::redirect::RedirectInfo;
use super::sas::SasToken;
use super::transport::{AmqpTransport, ConnectOptions, AMQPS_PORT};

/// Translator settings
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    /// Lifetime of the SAS token presented to the hub
    pub token_ttl_minutes: u64,
    /// How long to wait for the redirect before giving up
    pub redirect_timeout: Duration,
    pub port: u16,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: 5,
            redirect_timeout: Duration::from_secs(30),
            port: AMQPS_PORT,
        }
    }
}

/// Discovers the Event Hub-compatible endpoint behind an IoT Hub
#[derive(Debug, Clone, Default)]
pub struct ConnectionTranslator {
    config: TranslatorConfig,
}

impl ConnectionTranslator {
    pub fn new(config: TranslatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Translate `connection_string` using `transport`.
    ///
    /// The input is fully validated before the transport is touched. Once
    /// the transport has been opened it is closed again on every path.
    pub async fn translate<T: AmqpTransport + ?Sized>(
        &self,
        transport: &mut T,
        connection_string: &str,
    ) -> TranslateResult<EventHubConnectionString> {
        let iothub = IotHubConnectionString::parse(connection_string)?;
        let options = self.connect_options(&iothub)?;

        tracing::debug!(host = %iothub.host_name, "Opening transient IoT Hub connection");
        transport
            .open(&options)
            .await
            .map_err(|e| TranslateError::Protocol(e.to_string()))?;

        let result = self.await_redirect(transport, &iothub).await;

        if let Err(e) = transport.close().await {
            tracing::debug!(error = %e, "Ignoring error while closing IoT Hub connection");
        }

        let redirect = result?;
        tracing::info!(
            hostname = %redirect.hostname,
            entity_path = %redirect.entity_path,
            "Discovered Event Hub-compatible endpoint"
        );

        Ok(EventHubConnectionString {
            host_name: redirect.hostname,
            entity_path: redirect.entity_path,
            shared_access_key_name: iothub.shared_access_key_name,
            shared_access_key: iothub.shared_access_key,
        })
    }

    /// SASL credentials and endpoint for the hub
    pub fn connect_options(&self, iothub: &IotHubConnectionString) -> TranslateResult<ConnectOptions> {
        let username = iothub.amqp_username()?;
        let token = SasToken::generate(
            &iothub.events_resource_uri(),
            &iothub.shared_access_key,
            &iothub.shared_access_key_name,
            self.config.token_ttl_minutes,
        )?;

        Ok(ConnectOptions {
            host: iothub.host_name.clone(),
            port: self.config.port,
            username,
            password: token.to_string(),
            use_tls: true,
            reconnect: false,
        })
    }

    async fn await_redirect<T: AmqpTransport + ?Sized>(
        &self,
        transport: &mut T,
        iothub: &IotHubConnectionString,
    ) -> TranslateResult<RedirectInfo> {
        let link = transport
            .create_management_link(&iothub.management_address())
            .await
            .map_err(|e| TranslateError::Protocol(e.to_string()))?;

        let failure = match tokio::time::timeout(self.config.redirect_timeout, link).await {
            Ok(Ok(failure)) => failure,
            Ok(Err(_)) => {
                return Err(TranslateError::Protocol(
                    "management link closed without reporting an error".to_string(),
                ))
            }
            Err(_) => return Err(TranslateError::Timeout(self.config.redirect_timeout)),
        };

        RedirectInfo::from_link_failure(&failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::transport::{LinkFailure, TransportError, LINK_REDIRECT};
    use async_trait::async_trait;
    use tokio::sync::oneshot;

    const CONN: &str = "HostName=myhub.azure-devices.net;SharedAccessKeyName=service;SharedAccessKey=MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

    /// What the fake link does once attached
    enum Script {
        Fail(LinkFailure),
        Silent,
        Drop,
    }

    struct FakeTransport {
        script: Script,
        fail_close: bool,
        opened_with: Option<ConnectOptions>,
        link_address: Option<String>,
        closed: bool,
        pending: Option<oneshot::Sender<LinkFailure>>,
    }

    impl FakeTransport {
        fn new(script: Script) -> Self {
            Self {
                script,
                fail_close: false,
                opened_with: None,
                link_address: None,
                closed: false,
                pending: None,
            }
        }

        fn redirect(hostname: &str, address: &str) -> Self {
            Self::new(Script::Fail(
                LinkFailure::new(LINK_REDIRECT)
                    .with_info("hostname", hostname)
                    .with_info("address", address),
            ))
        }
    }

    #[async_trait]
    impl AmqpTransport for FakeTransport {
        async fn open(&mut self, options: &ConnectOptions) -> Result<(), TransportError> {
            self.opened_with = Some(options.clone());
            Ok(())
        }

        async fn create_management_link(
            &mut self,
            address: &str,
        ) -> Result<oneshot::Receiver<LinkFailure>, TransportError> {
            self.link_address = Some(address.to_string());
            let (tx, rx) = oneshot::channel();
            match &self.script {
                Script::Fail(failure) => {
                    let _ = tx.send(failure.clone());
                }
                Script::Silent => self.pending = Some(tx),
                Script::Drop => drop(tx),
            }
            Ok(rx)
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.closed = true;
            self.pending = None;
            if self.fail_close {
                Err(TransportError::new("already closed"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_translate_success() {
        let mut transport = FakeTransport::redirect(
            "eh.example.com",
            "amqps://eh.example.com:5671/myhub/$management",
        );
        let translator = ConnectionTranslator::default();

        let result = translator.translate(&mut transport, CONN).await.unwrap();
        assert_eq!(
            result.to_string(),
            "Endpoint=sb://eh.example.com/;EntityPath=myhub;SharedAccessKeyName=service;\
             SharedAccessKey=MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY="
        );
        assert!(transport.closed);

        let options = transport.opened_with.unwrap();
        assert_eq!(options.host, "myhub.azure-devices.net");
        assert_eq!(options.port, 5671);
        assert_eq!(options.username, "service@sas.root.myhub");
        assert!(options.password.starts_with(
            "SharedAccessSignature sr=myhub.azure-devices.net%2Fmessages%2Fevents&sig="
        ));
        assert!(options.password.ends_with("&skn=service"));
        assert!(options.use_tls);
        assert!(!options.reconnect);
        assert_eq!(
            transport.link_address.unwrap(),
            "amqps://myhub.azure-devices.net/messages/events/$management"
        );
    }

    #[tokio::test]
    async fn test_invalid_input_never_opens() {
        let mut transport = FakeTransport::redirect("eh.example.com", "x:5671/a/$management");
        let translator = ConnectionTranslator::default();

        let err = translator
            .translate(&mut transport, "HostName=myhub.azure-devices.net;SharedAccessKeyName=service")
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::InvalidConnectionString(_)));
        assert!(transport.opened_with.is_none());
        assert!(!transport.closed);
    }

    #[tokio::test]
    async fn test_name_extraction_never_opens() {
        let mut transport = FakeTransport::redirect("eh.example.com", "x:5671/a/$management");
        let translator = ConnectionTranslator::default();

        let err = translator
            .translate(
                &mut transport,
                "HostName=.azure-devices.net;SharedAccessKeyName=service;SharedAccessKey=YWJj",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::NameExtraction(_)));
        assert!(transport.opened_with.is_none());
    }

    #[tokio::test]
    async fn test_missing_hostname_closes() {
        let mut transport = FakeTransport::new(Script::Fail(
            LinkFailure::new(LINK_REDIRECT)
                .with_info("address", "amqps://eh.example.com:5671/myhub/$management"),
        ));
        let translator = ConnectionTranslator::default();

        let err = translator.translate(&mut transport, CONN).await.unwrap_err();
        assert!(matches!(err, TranslateError::RedirectMissingHostname));
        assert!(transport.closed);
    }

    #[tokio::test]
    async fn test_bad_address_closes() {
        let mut transport = FakeTransport::redirect("eh.example.com", "amqps://eh.example.com/nothing");
        let translator = ConnectionTranslator::default();

        let err = translator.translate(&mut transport, CONN).await.unwrap_err();
        assert!(matches!(err, TranslateError::RedirectAddressParse { .. }));
        assert!(err.to_string().contains("amqps://eh.example.com/nothing"));
        assert!(transport.closed);
    }

    #[tokio::test]
    async fn test_other_error_propagates() {
        let mut transport = FakeTransport::new(Script::Fail(
            LinkFailure::new("amqp:unauthorized-access").with_description("token expired"),
        ));
        let translator = ConnectionTranslator::default();

        let err = translator.translate(&mut transport, CONN).await.unwrap_err();
        match err {
            TranslateError::Protocol(message) => assert!(message.contains("token expired")),
            other => panic!("Expected Protocol, got {:?}", other),
        }
        assert!(transport.closed);
    }

    #[tokio::test]
    async fn test_close_failure_is_swallowed() {
        let mut transport = FakeTransport::redirect(
            "eh.example.com",
            "amqps://eh.example.com:5671/myhub/$management",
        );
        transport.fail_close = true;
        let translator = ConnectionTranslator::default();

        let result = translator.translate(&mut transport, CONN).await.unwrap();
        assert_eq!(result.entity_path, "myhub");
        assert!(transport.closed);
    }

    #[tokio::test]
    async fn test_timeout_closes() {
        let mut transport = FakeTransport::new(Script::Silent);
        let translator = ConnectionTranslator::new(TranslatorConfig {
            redirect_timeout: Duration::from_millis(20),
            ..Default::default()
        });

        let err = translator.translate(&mut transport, CONN).await.unwrap_err();
        assert!(matches!(err, TranslateError::Timeout(_)));
        assert!(transport.closed);
    }

    #[tokio::test]
    async fn test_dropped_link_is_protocol_error() {
        let mut transport = FakeTransport::new(Script::Drop);
        let translator = ConnectionTranslator::default();

        let err = translator.translate(&mut transport, CONN).await.unwrap_err();
        assert!(matches!(err, TranslateError::Protocol(_)));
        assert!(transport.closed);
    }
}
