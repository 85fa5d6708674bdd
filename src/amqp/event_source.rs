//! fe2o3-amqp backed [`EventSource`]
//!
//! Connects to the Event Hub namespace with SASL PLAIN (policy name and key),
//! discovers partitions through the `$management` node and attaches one
//! filtered receiver per partition.

use async_trait::async_trait;
use chrono::Utc;
use fe2o3_amqp::connection::ConnectionHandle;
use fe2o3_amqp::link::RecvError;
use fe2o3_amqp::sasl_profile::SaslProfile;
use fe2o3_amqp::session::SessionHandle;
use fe2o3_amqp::types::messaging::{
    ApplicationProperties, Body, Message, MessageId, Properties, Source, Target,
};
use fe2o3_amqp::types::primitives::{Symbol, Value};
use fe2o3_amqp::{Connection, Receiver, Sender, Session};
use serde_amqp::described::Described;
use serde_amqp::descriptor::Descriptor;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;

use super::convert::{body_bytes, device_id, enqueued_time, partition_ids_from_response};
use crate::connection::{EventHubConnectionString, AMQPS_PORT};
use crate::consumer::{
    ConsumerError, ConsumerResult, EventPosition, EventSource, PartitionReceiver, ReceivedEvent,
};

const MANAGEMENT_ADDRESS: &str = "$management";
const MANAGEMENT_REPLY_TO: &str = "telemetry-bridge-management-reply";
const SELECTOR_FILTER: &str = "apache.org:selector-filter:string";
const SELECTOR_FILTER_CODE: u64 = 0x0000_468C_0000_0004;

/// Connection settings for [`AmqpEventSource`]
#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub port: u16,
    /// Bound on each step of partition discovery
    pub management_timeout: Duration,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            port: AMQPS_PORT,
            management_timeout: Duration::from_secs(30),
        }
    }
}

/// Event Hub reached over AMQP
pub struct AmqpEventSource {
    connection_string: EventHubConnectionString,
    options: SourceOptions,
    connection: Mutex<Option<ConnectionHandle<()>>>,
    session: Mutex<Option<SessionHandle<()>>>,
}

impl AmqpEventSource {
    /// Open a connection and session to the Event Hub namespace
    pub async fn connect(
        connection_string: EventHubConnectionString,
        options: SourceOptions,
    ) -> ConsumerResult<Self> {
        let url = namespace_url(&connection_string.host_name, options.port);
        let container_id = format!("telemetry-bridge-{}", uuid::Uuid::new_v4());

        let mut connection = Connection::builder()
            .container_id(container_id)
            .sasl_profile(SaslProfile::Plain {
                username: connection_string.shared_access_key_name.clone(),
                password: connection_string.shared_access_key.clone(),
            })
            .open(url.as_str())
            .await
            .map_err(|e| ConsumerError::Connection(e.to_string()))?;

        let session = Session::begin(&mut connection)
            .await
            .map_err(|e| ConsumerError::Connection(e.to_string()))?;

        tracing::info!(
            host = %connection_string.host_name,
            entity_path = %connection_string.entity_path,
            "Connected to Event Hub"
        );

        Ok(Self {
            connection_string,
            options,
            connection: Mutex::new(Some(connection)),
            session: Mutex::new(Some(session)),
        })
    }

    pub fn entity_path(&self) -> &str {
        &self.connection_string.entity_path
    }

    /// Send the READ request and parse its reply
    async fn read_partition_ids(
        &self,
        sender: &mut Sender,
        receiver: &mut Receiver,
    ) -> ConsumerResult<Vec<String>> {
        let management = |e: String| ConsumerError::Management(e);

        let request = Message::builder()
            .properties(
                Properties::builder()
                    .message_id(MessageId::String(uuid::Uuid::new_v4().to_string()))
                    .reply_to(MANAGEMENT_REPLY_TO)
                    .build(),
            )
            .application_properties(
                ApplicationProperties::builder()
                    .insert("operation", "READ".to_string())
                    .insert("name", self.connection_string.entity_path.clone())
                    .insert("type", "com.microsoft:eventhub".to_string())
                    .build(),
            )
            .value(Value::Null)
            .build();

        let _outcome = sender
            .send(request)
            .await
            .map_err(|e| management(e.to_string()))?;
        let response = receiver
            .recv::<Value>()
            .await
            .map_err(|e| management(e.to_string()))?;
        let _ = receiver.accept(&response).await;

        partition_ids_from_response(response.body())
            .filter(|ids| !ids.is_empty())
            .ok_or_else(|| {
                management(format!(
                    "response for '{}' did not contain partition_ids",
                    self.connection_string.entity_path
                ))
            })
    }

    fn partition_address(&self, consumer_group: &str, partition_id: &str) -> String {
        format!(
            "{}/ConsumerGroups/{}/Partitions/{}",
            self.connection_string.entity_path, consumer_group, partition_id
        )
    }
}

fn not_connected() -> ConsumerError {
    ConsumerError::Connection("event source is closed".to_string())
}

fn namespace_url(host_name: &str, port: u16) -> String {
    format!("amqps://{}:{}", host_name, port)
}

/// Bound one management step; expiry is a management failure
async fn within<T, F>(timeout: Duration, step: &str, fut: F) -> ConsumerResult<T>
where
    F: Future<Output = ConsumerResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ConsumerError::Management(format!(
            "{} timed out after {:?}",
            step, timeout
        ))),
    }
}

#[async_trait]
impl EventSource for AmqpEventSource {
    async fn partition_ids(&self) -> ConsumerResult<Vec<String>> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(not_connected)?;
        let timeout = self.options.management_timeout;

        let mut sender = within(timeout, "management sender attach", async {
            Sender::attach(&mut *session, "management-sender", MANAGEMENT_ADDRESS)
                .await
                .map_err(|e| ConsumerError::Management(e.to_string()))
        })
        .await?;

        let receiver = within(timeout, "management receiver attach", async {
            Receiver::builder()
                .name("management-receiver")
                .source(Source::builder().address(MANAGEMENT_ADDRESS).build())
                .target(Target::builder().address(MANAGEMENT_REPLY_TO).build())
                .attach(&mut *session)
                .await
                .map_err(|e| ConsumerError::Management(e.to_string()))
        })
        .await;
        let mut receiver = match receiver {
            Ok(receiver) => receiver,
            Err(e) => {
                let _ = tokio::time::timeout(timeout, sender.close()).await;
                return Err(e);
            }
        };

        let ids = within(
            timeout,
            "management READ",
            self.read_partition_ids(&mut sender, &mut receiver),
        )
        .await;

        let _ = tokio::time::timeout(timeout, sender.close()).await;
        let _ = tokio::time::timeout(timeout, receiver.close()).await;
        ids
    }

    async fn open_partition(
        &self,
        partition_id: &str,
        consumer_group: &str,
        position: &EventPosition,
    ) -> ConsumerResult<Box<dyn PartitionReceiver>> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(not_connected)?;

        let filter = Described {
            descriptor: Descriptor::Code(SELECTOR_FILTER_CODE),
            value: Value::String(position.selector()),
        };
        let source = Source::builder()
            .address(self.partition_address(consumer_group, partition_id))
            .add_to_filter(Symbol::from(SELECTOR_FILTER), Some(filter))
            .build();

        let receiver = Receiver::builder()
            .name(format!("{}-partition-{}", consumer_group, partition_id))
            .source(source)
            .attach(session)
            .await
            .map_err(|e| ConsumerError::LinkClosed(e.to_string()))?;

        tracing::debug!(
            partition_id = %partition_id,
            consumer_group = %consumer_group,
            position = %position,
            "Attached partition receiver"
        );

        Ok(Box::new(AmqpPartitionReceiver {
            partition_id: partition_id.to_string(),
            receiver: Some(receiver),
        }))
    }

    async fn close(&self) -> ConsumerResult<()> {
        if let Some(mut session) = self.session.lock().await.take() {
            let _ = session.end().await;
        }
        if let Some(mut connection) = self.connection.lock().await.take() {
            connection
                .close()
                .await
                .map_err(|e| ConsumerError::Connection(e.to_string()))?;
        }
        Ok(())
    }
}

/// Receiver attached to one partition
struct AmqpPartitionReceiver {
    partition_id: String,
    /// Taken on close
    receiver: Option<Receiver>,
}

#[async_trait]
impl PartitionReceiver for AmqpPartitionReceiver {
    fn partition_id(&self) -> &str {
        &self.partition_id
    }

    async fn receive(&mut self) -> ConsumerResult<Vec<ReceivedEvent>> {
        let receiver = self
            .receiver
            .as_mut()
            .ok_or_else(|| ConsumerError::LinkClosed("receiver is closed".to_string()))?;

        let delivery = match receiver.recv::<Body<Value>>().await {
            Ok(delivery) => delivery,
            Err(RecvError::LinkStateError(e)) => return Err(ConsumerError::LinkClosed(e.to_string())),
            Err(e) => return Err(ConsumerError::Receive(e.to_string())),
        };

        if let Err(e) = receiver.accept(&delivery).await {
            tracing::debug!(partition_id = %self.partition_id, error = %e, "Failed to settle delivery");
        }

        let message = delivery.message();
        let annotations = message.message_annotations.as_ref();
        let event = ReceivedEvent {
            body: body_bytes(&message.body),
            enqueued_time: enqueued_time(annotations).unwrap_or_else(Utc::now),
            device_id: device_id(annotations),
            partition_id: self.partition_id.clone(),
        };

        Ok(vec![event])
    }

    async fn close(&mut self) -> ConsumerResult<()> {
        match self.receiver.take() {
            Some(receiver) => receiver
                .close()
                .await
                .map_err(|e| ConsumerError::LinkClosed(e.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_url_uses_port() {
        assert_eq!(namespace_url("eh.example.com", 5671), "amqps://eh.example.com:5671");
        assert_eq!(namespace_url("localhost", 5672), "amqps://localhost:5672");
        assert_eq!(SourceOptions::default().port, AMQPS_PORT);
    }

    #[tokio::test]
    async fn test_unanswered_management_step_times_out() {
        let result = within(
            Duration::from_millis(20),
            "management READ",
            std::future::pending::<ConsumerResult<Vec<String>>>(),
        )
        .await;
        match result {
            Err(ConsumerError::Management(msg)) => assert!(msg.contains("management READ")),
            other => panic!("Expected Management timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_answered_management_step_passes_through() {
        let ok = within(Duration::from_secs(1), "read", async { Ok(vec!["0".to_string()]) }).await;
        assert_eq!(ok.unwrap(), vec!["0"]);

        let err: ConsumerResult<()> = within(Duration::from_secs(1), "read", async {
            Err(ConsumerError::Management("denied".into()))
        })
        .await;
        assert!(matches!(err, Err(ConsumerError::Management(m)) if m == "denied"));
    }
}
