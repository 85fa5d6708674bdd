//! Telemetry Bridge Server
//!
//! Discovers the Event Hub-compatible endpoint of an IoT Hub, reads device
//! telemetry from every partition and relays it to dashboards over WebSocket.
//!
//! # Configuration
//!
//! Config file (`--config`, or the default search path) with environment
//! overrides:
//! - `IOTHUB_CONNECTION_STRING` / `IotHubConnectionString`
//! - `EVENTHUB_CONSUMER_GROUP` / `EventHubConsumerGroup`
//! - `BRIDGE_API_HOST`, `BRIDGE_API_PORT` / `PORT`
//! - `BRIDGE_LOG_LEVEL`, `BRIDGE_LOG_FORMAT`
//! - `RUST_LOG`: overrides the configured log filter

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use telemetry_bridge::amqp::{discover_event_hub, AmqpEventSource};
use telemetry_bridge::api::{serve, AppState};
use telemetry_bridge::config::{Config, LoggingConfig};
use telemetry_bridge::connection::ConnectionTranslator;
use telemetry_bridge::consumer::{EventHubReader, ReceivedEvent};
use telemetry_bridge::dashboard::DeviceTracker;
use telemetry_bridge::relay::{Relay, RelayStatus};
use telemetry_bridge::websocket::WsEvent;

#[derive(Parser)]
#[command(name = "telemetry-bridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Relay IoT Hub device telemetry to live dashboards")]
struct Args {
    /// Config file (default: search standard locations)
    #[arg(short, long, env = "BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// IoT Hub connection string (overrides config)
    #[arg(long)]
    connection_string: Option<String>,

    /// Event Hub consumer group (overrides config)
    #[arg(long)]
    consumer_group: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

/// A running consume-and-relay pipeline
struct Pipeline {
    reader: EventHubReader<AmqpEventSource>,
    relay: JoinHandle<()>,
}

impl Pipeline {
    async fn shutdown(mut self) {
        self.reader.stop().await;
        // The reader held the last event sender; the relay drains and exits
        if let Err(e) = self.relay.await {
            tracing::warn!(error = %e, "Relay task ended abnormally");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(cs) = args.connection_string {
        config.iothub.connection_string = cs;
    }
    if let Some(group) = args.consumer_group {
        config.iothub.consumer_group = group;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }

    init_logging(&config.logging);

    tracing::info!("Starting telemetry bridge v{}", env!("CARGO_PKG_VERSION"));

    if config.iothub.connection_string.trim().is_empty() {
        bail!("No IoT Hub connection string configured (set IOTHUB_CONNECTION_STRING or [iothub].connection_string)");
    }

    let state = AppState::with_components(
        config.api.clone(),
        config.hub_config(),
        DeviceTracker::new(config.dashboard.window_capacity),
    );

    let pipeline = tokio::spawn(start_pipeline(config.clone(), state.clone()));

    serve(state.clone(), &config.api)
        .await
        .context("HTTP server failed")?;

    if !pipeline.is_finished() {
        tracing::info!("Abandoning pipeline startup");
        pipeline.abort();
    }
    match pipeline.await {
        Ok(Some(pipeline)) => {
            tracing::info!("Stopping event reader...");
            pipeline.shutdown().await;
        }
        Ok(None) => {}
        Err(e) if e.is_cancelled() => {}
        Err(e) => tracing::warn!(error = %e, "Pipeline task panicked"),
    }
    state.set_relay_status(RelayStatus::Stopped).await;

    tracing::info!("Telemetry bridge stopped");
    Ok(())
}

/// Discover the endpoint, attach the reader and start relaying.
///
/// Failures are recorded in the relay status; the HTTP server keeps running
/// so health checks can report them.
async fn start_pipeline(config: Config, state: AppState) -> Option<Pipeline> {
    match try_start_pipeline(&config, &state).await {
        Ok(pipeline) => Some(pipeline),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Telemetry pipeline failed to start");
            state
                .set_relay_status(RelayStatus::Failed {
                    error: format!("{:#}", e),
                })
                .await;
            state.ws_hub.publish(WsEvent::system("Telemetry relay failed to start"));
            None
        }
    }
}

async fn try_start_pipeline(config: &Config, state: &AppState) -> Result<Pipeline> {
    let reader_config = config.reader_config()?;
    let translator = ConnectionTranslator::new(config.translator_config());

    tracing::info!("Discovering Event Hub-compatible endpoint...");
    let event_hub = discover_event_hub(&translator, &config.iothub.connection_string)
        .await
        .context("Endpoint discovery failed")?;
    tracing::info!(
        endpoint = %event_hub.endpoint(),
        entity_path = %event_hub.entity_path,
        "Event Hub endpoint discovered"
    );

    let entity_path = event_hub.entity_path.clone();
    let source = AmqpEventSource::connect(event_hub, config.source_options())
        .await
        .context("Failed to connect to Event Hub")?;

    let (tx, rx) = mpsc::unbounded_channel::<ReceivedEvent>();
    let relay = Relay::new(Arc::clone(&state.tracker), Arc::clone(&state.ws_hub));
    let relay = tokio::spawn(relay.run(rx));

    let mut reader = EventHubReader::new(source, reader_config);
    let partitions = match reader
        .start(move |event: ReceivedEvent| {
            let _ = tx.send(event);
        })
        .await
    {
        Ok(partitions) => partitions,
        Err(e) => {
            reader.stop().await;
            relay.abort();
            return Err(e).context("Failed to start event reader");
        }
    };

    tracing::info!(
        partitions = ?partitions,
        consumer_group = %reader.config().consumer_group,
        "Relaying telemetry"
    );
    state
        .set_relay_status(RelayStatus::Running {
            entity_path,
            partitions,
        })
        .await;
    state.ws_hub.publish(WsEvent::system("Telemetry relay running"));

    Ok(Pipeline { reader, relay })
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "telemetry_bridge={},tower_http=info",
            logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
