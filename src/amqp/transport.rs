//! fe2o3-amqp backed [`AmqpTransport`]

use async_trait::async_trait;
use fe2o3_amqp::connection::ConnectionHandle;
use fe2o3_amqp::link::{LinkStateError, ReceiverAttachError, RecvError};
use fe2o3_amqp::sasl_profile::SaslProfile;
use fe2o3_amqp::session::SessionHandle;
use fe2o3_amqp::types::primitives::Value;
use fe2o3_amqp::{Connection, Receiver, Session};
use tokio::sync::oneshot;

use super::convert::link_failure;
use crate::connection::{AmqpTransport, ConnectOptions, LinkFailure, TransportError};

const INTERNAL_ERROR: &str = "amqp:internal-error";

/// Single-use AMQP connection for redirect discovery
#[derive(Default)]
pub struct AmqpLinkTransport {
    connection: Option<ConnectionHandle<()>>,
}

impl AmqpLinkTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AmqpTransport for AmqpLinkTransport {
    async fn open(&mut self, options: &ConnectOptions) -> Result<(), TransportError> {
        let container_id = format!("telemetry-bridge-{}", uuid::Uuid::new_v4());
        let connection = Connection::builder()
            .container_id(container_id)
            .sasl_profile(SaslProfile::Plain {
                username: options.username.clone(),
                password: options.password.clone(),
            })
            .open(options.url().as_str())
            .await
            .map_err(TransportError::new)?;

        tracing::debug!(url = %options.url(), "AMQP connection opened");
        self.connection = Some(connection);
        Ok(())
    }

    async fn create_management_link(
        &mut self,
        address: &str,
    ) -> Result<oneshot::Receiver<LinkFailure>, TransportError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| TransportError::new("connection is not open"))?;
        let mut session = Session::begin(connection)
            .await
            .map_err(TransportError::new)?;

        let (tx, rx) = oneshot::channel();
        let address = address.to_string();
        tokio::spawn(async move {
            let failure = wait_for_link_error(&mut session, address).await;
            let _ = tx.send(failure);
            let _ = session.end().await;
        });

        Ok(rx)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.connection.take() {
            Some(mut connection) => connection.close().await.map_err(TransportError::new),
            None => Ok(()),
        }
    }
}

/// Attach a receiver and return the first error the link reports
async fn wait_for_link_error(session: &mut SessionHandle<()>, address: String) -> LinkFailure {
    let link_name = format!("management-{}", uuid::Uuid::new_v4());
    let mut receiver = match Receiver::attach(session, link_name, address).await {
        Ok(receiver) => receiver,
        Err(ReceiverAttachError::RemoteClosedWithError(error)) => return link_failure(&error),
        Err(e) => return LinkFailure::new(INTERNAL_ERROR).with_description(e.to_string()),
    };

    loop {
        match receiver.recv::<Value>().await {
            Ok(delivery) => {
                tracing::debug!("Ignoring unexpected delivery on management link");
                let _ = receiver.accept(&delivery).await;
            }
            Err(RecvError::LinkStateError(LinkStateError::RemoteDetachedWithError(error)))
            | Err(RecvError::LinkStateError(LinkStateError::RemoteClosedWithError(error))) => {
                return link_failure(&error);
            }
            Err(e) => {
                return LinkFailure::new(INTERNAL_ERROR).with_description(e.to_string());
            }
        }
    }
}
