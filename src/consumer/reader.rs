//! Event Hub Reader
//!
//! Subscribes to every partition of an Event Hub and hands each received
//! event to a callback. One task per partition; ordering is preserved within
//! a partition only.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::{ConsumerError, ConsumerResult};
use super::event::{EventHandler, EventPosition};
use super::source::{EventSource, PartitionReceiver};

/// Reader configuration
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub consumer_group: String,
    pub start_position: EventPosition,
    /// Explicit partitions; empty means ask the service
    pub partition_ids: Vec<String>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            consumer_group: "$Default".to_string(),
            start_position: EventPosition::Latest,
            partition_ids: Vec::new(),
        }
    }
}

impl ReaderConfig {
    pub fn new(consumer_group: impl Into<String>) -> Self {
        Self {
            consumer_group: consumer_group.into(),
            ..Default::default()
        }
    }
}

/// An active partition subscription
struct Subscription {
    partition_id: String,
    handle: JoinHandle<()>,
}

/// Reads all partitions of an Event Hub into an [`EventHandler`]
pub struct EventHubReader<S: EventSource> {
    source: Arc<S>,
    config: ReaderConfig,
    /// Tracked from construction so `stop` is valid at any time
    subscriptions: Vec<Subscription>,
    cancel: CancellationToken,
    started: bool,
    stopped: bool,
}

impl<S: EventSource> EventHubReader<S> {
    pub fn new(source: S, config: ReaderConfig) -> Self {
        Self {
            source: Arc::new(source),
            config,
            subscriptions: Vec::new(),
            cancel: CancellationToken::new(),
            started: false,
            stopped: false,
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Partitions with a running subscription
    pub fn active_partitions(&self) -> Vec<String> {
        self.subscriptions
            .iter()
            .filter(|s| !s.handle.is_finished())
            .map(|s| s.partition_id.clone())
            .collect()
    }

    /// Subscribe to every partition.
    ///
    /// Partitions that fail to open are logged and skipped; the call fails
    /// only if none could be opened. Returns the subscribed partition ids.
    pub async fn start<H: EventHandler>(&mut self, handler: H) -> ConsumerResult<Vec<String>> {
        if self.stopped {
            return Err(ConsumerError::Stopped);
        }
        if self.started {
            return Err(ConsumerError::AlreadyStarted);
        }

        let partition_ids = if self.config.partition_ids.is_empty() {
            self.source.partition_ids().await?
        } else {
            self.config.partition_ids.clone()
        };
        tracing::info!(partitions = ?partition_ids, "Event Hub partitions");

        let handler: Arc<dyn EventHandler> = Arc::new(handler);
        let mut subscribed = Vec::new();

        for partition_id in partition_ids {
            let receiver = match self
                .source
                .open_partition(
                    &partition_id,
                    &self.config.consumer_group,
                    &self.config.start_position,
                )
                .await
            {
                Ok(receiver) => receiver,
                Err(e) => {
                    tracing::error!(
                        partition_id = %partition_id,
                        error = %e,
                        "Failed to open partition receiver"
                    );
                    continue;
                }
            };

            let handle = tokio::spawn(run_partition(
                receiver,
                Arc::clone(&handler),
                self.cancel.child_token(),
            ));
            self.subscriptions.push(Subscription {
                partition_id: partition_id.clone(),
                handle,
            });
            subscribed.push(partition_id);
        }

        if subscribed.is_empty() {
            return Err(ConsumerError::NoPartitions);
        }

        self.started = true;
        tracing::info!(
            consumer_group = %self.config.consumer_group,
            position = %self.config.start_position,
            partitions = subscribed.len(),
            "Subscribed to Event Hub"
        );
        Ok(subscribed)
    }

    /// Stop all subscriptions and close the source.
    ///
    /// Valid before `start` and safe to call more than once. The reader
    /// cannot be restarted afterwards; `start` returns [`ConsumerError::Stopped`].
    pub async fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.cancel.cancel();

        for subscription in self.subscriptions.drain(..) {
            if let Err(e) = subscription.handle.await {
                tracing::warn!(
                    partition_id = %subscription.partition_id,
                    error = %e,
                    "Partition task ended abnormally"
                );
            }
        }

        if let Err(e) = self.source.close().await {
            tracing::debug!(error = %e, "Ignoring error while closing event source");
        }
    }
}

async fn run_partition(
    mut receiver: Box<dyn PartitionReceiver>,
    handler: Arc<dyn EventHandler>,
    cancel: CancellationToken,
) {
    let partition_id = receiver.partition_id().to_string();
    tracing::debug!(partition_id = %partition_id, "Partition receiver started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = receiver.receive() => match result {
                Ok(events) => {
                    for event in events {
                        handler.on_event(event);
                    }
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(partition_id = %partition_id, error = %e, "Partition receiver stopped");
                    break;
                }
                Err(e) => {
                    tracing::error!(partition_id = %partition_id, error = %e, "Error receiving events");
                }
            }
        }
    }

    if let Err(e) = receiver.close().await {
        tracing::debug!(partition_id = %partition_id, error = %e, "Ignoring error while closing receiver");
    }
    tracing::debug!(partition_id = %partition_id, "Partition receiver finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::event::ReceivedEvent;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Scripted receive results; an exhausted script waits forever
    struct FakeReceiver {
        partition_id: String,
        script: VecDeque<ConsumerResult<Vec<ReceivedEvent>>>,
    }

    #[async_trait]
    impl PartitionReceiver for FakeReceiver {
        fn partition_id(&self) -> &str {
            &self.partition_id
        }

        async fn receive(&mut self) -> ConsumerResult<Vec<ReceivedEvent>> {
            match self.script.pop_front() {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> ConsumerResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeSource {
        partitions: Vec<String>,
        unavailable: Vec<String>,
        scripts: Mutex<Vec<(String, VecDeque<ConsumerResult<Vec<ReceivedEvent>>>)>>,
        opened: Mutex<Vec<(String, String)>>,
        closed: AtomicBool,
    }

    impl FakeSource {
        fn with_partitions(ids: &[&str]) -> Self {
            Self {
                partitions: ids.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        fn script(self, partition: &str, results: Vec<ConsumerResult<Vec<ReceivedEvent>>>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .push((partition.to_string(), results.into_iter().collect()));
            self
        }
    }

    #[async_trait]
    impl EventSource for FakeSource {
        async fn partition_ids(&self) -> ConsumerResult<Vec<String>> {
            Ok(self.partitions.clone())
        }

        async fn open_partition(
            &self,
            partition_id: &str,
            consumer_group: &str,
            _position: &EventPosition,
        ) -> ConsumerResult<Box<dyn PartitionReceiver>> {
            if self.unavailable.iter().any(|p| p == partition_id) {
                return Err(ConsumerError::LinkClosed("partition unavailable".into()));
            }
            self.opened
                .lock()
                .unwrap()
                .push((partition_id.to_string(), consumer_group.to_string()));

            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts
                .iter()
                .position(|(p, _)| p == partition_id)
                .map(|i| scripts.remove(i).1)
                .unwrap_or_default();

            Ok(Box::new(FakeReceiver {
                partition_id: partition_id.to_string(),
                script,
            }))
        }

        async fn close(&self) -> ConsumerResult<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn channel_handler() -> (impl EventHandler, mpsc::UnboundedReceiver<ReceivedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = move |event: ReceivedEvent| {
            let _ = tx.send(event);
        };
        (handler, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<ReceivedEvent>) -> ReceivedEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let mut reader = EventHubReader::new(FakeSource::default(), ReaderConfig::default());
        reader.stop().await;
        reader.stop().await;
        assert!(reader.active_partitions().is_empty());
        assert!(reader.source.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stopped_reader_cannot_restart() {
        let mut reader =
            EventHubReader::new(FakeSource::with_partitions(&["0"]), ReaderConfig::default());
        let (first, _rx1) = channel_handler();
        reader.start(first).await.unwrap();
        reader.stop().await;

        let (second, _rx2) = channel_handler();
        assert!(matches!(
            reader.start(second).await,
            Err(ConsumerError::Stopped)
        ));
        assert!(reader.active_partitions().is_empty());
        assert_eq!(reader.source.opened.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delivers_events_from_all_partitions() {
        let source = FakeSource::with_partitions(&["0", "1"])
            .script("0", vec![Ok(vec![ReceivedEvent::new("0", b"a".to_vec()).device("dev-a")])])
            .script("1", vec![Ok(vec![ReceivedEvent::new("1", b"b".to_vec()).device("dev-b")])]);
        let mut reader = EventHubReader::new(source, ReaderConfig::new("dashboard"));
        let (handler, mut rx) = channel_handler();

        let partitions = reader.start(handler).await.unwrap();
        assert_eq!(partitions, vec!["0", "1"]);

        let mut devices = vec![
            next(&mut rx).await.device_id.unwrap(),
            next(&mut rx).await.device_id.unwrap(),
        ];
        devices.sort();
        assert_eq!(devices, vec!["dev-a", "dev-b"]);

        let opened = reader.source.opened.lock().unwrap().clone();
        assert!(opened.iter().all(|(_, group)| group == "dashboard"));

        reader.stop().await;
        assert!(reader.active_partitions().is_empty());
    }

    #[tokio::test]
    async fn test_errors_are_logged_and_stream_continues() {
        let source = FakeSource::with_partitions(&["0"]).script(
            "0",
            vec![
                Err(ConsumerError::Receive("decode failure".into())),
                Ok(vec![ReceivedEvent::new("0", b"after".to_vec())]),
            ],
        );
        let mut reader = EventHubReader::new(source, ReaderConfig::default());
        let (handler, mut rx) = channel_handler();

        reader.start(handler).await.unwrap();
        assert_eq!(next(&mut rx).await.body, b"after".to_vec());

        reader.stop().await;
    }

    #[tokio::test]
    async fn test_fatal_error_ends_partition() {
        let source = FakeSource::with_partitions(&["0"]).script(
            "0",
            vec![
                Err(ConsumerError::LinkClosed("detached".into())),
                Ok(vec![ReceivedEvent::new("0", b"never".to_vec())]),
            ],
        );
        let mut reader = EventHubReader::new(source, ReaderConfig::default());
        let (handler, mut rx) = channel_handler();

        reader.start(handler).await.unwrap();
        let received = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(received.is_err() || received.unwrap().is_none());

        reader.stop().await;
    }

    #[tokio::test]
    async fn test_configured_partitions_and_skips() {
        let source = FakeSource {
            partitions: vec!["ignored".to_string()],
            unavailable: vec!["2".to_string()],
            ..Default::default()
        };
        let config = ReaderConfig {
            partition_ids: vec!["1".to_string(), "2".to_string()],
            ..Default::default()
        };
        let mut reader = EventHubReader::new(source, config);
        let (handler, _rx) = channel_handler();

        let partitions = reader.start(handler).await.unwrap();
        assert_eq!(partitions, vec!["1"]);
        reader.stop().await;
    }

    #[tokio::test]
    async fn test_no_partitions_and_double_start() {
        let mut empty = EventHubReader::new(FakeSource::default(), ReaderConfig::default());
        let (handler, _rx) = channel_handler();
        assert!(matches!(
            empty.start(handler).await,
            Err(ConsumerError::NoPartitions)
        ));

        let mut reader =
            EventHubReader::new(FakeSource::with_partitions(&["0"]), ReaderConfig::default());
        let (first, _rx1) = channel_handler();
        let (second, _rx2) = channel_handler();
        reader.start(first).await.unwrap();
        assert!(matches!(
            reader.start(second).await,
            Err(ConsumerError::AlreadyStarted)
        ));
        reader.stop().await;
    }
}
