//! Telemetry Bridge CLI
//!
//! Command-line companion for the bridge:
//! - Translate an IoT Hub connection string to its Event Hub form
//! - Mint a SAS token for the hub's event endpoint
//! - Check server status and browse relayed devices
//! - Generate or inspect configuration

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use telemetry_bridge::amqp::discover_event_hub;
use telemetry_bridge::config::{generate_default_config, Config};
use telemetry_bridge::connection::{
    ConnectionTranslator, IotHubConnectionString, SasToken, TranslatorConfig,
};

#[derive(Parser)]
#[command(name = "telemetry-bridge-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tools for the IoT Hub telemetry bridge")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Bridge server URL
    #[arg(long, default_value = "http://localhost:3000", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the Event Hub-compatible connection string for an IoT Hub
    Translate {
        /// IoT Hub connection string
        #[arg(env = "IOTHUB_CONNECTION_STRING", hide_env_values = true)]
        connection_string: String,
        /// Seconds to wait for the hub's redirect
        #[arg(long, default_value = "30")]
        timeout: u64,
    },

    /// Print a SAS token for the hub's event endpoint
    Token {
        /// IoT Hub connection string
        #[arg(env = "IOTHUB_CONNECTION_STRING", hide_env_values = true)]
        connection_string: String,
        /// Token lifetime in minutes
        #[arg(long, default_value = "5")]
        ttl: u64,
    },

    /// Show server status
    Status,

    /// List relayed devices, or show one device's readings
    Devices {
        /// Device id
        device: Option<String>,
    },

    /// Generate default config file, or show the effective one
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Show the resolved configuration with secrets masked
        #[arg(long)]
        show: bool,
        /// Config file to resolve with --show
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let json = cli.format.eq_ignore_ascii_case("json");

    match cli.command {
        Commands::Translate {
            connection_string,
            timeout,
        } => {
            let translator = ConnectionTranslator::new(TranslatorConfig {
                redirect_timeout: Duration::from_secs(timeout),
                ..Default::default()
            });
            let event_hub = discover_event_hub(&translator, &connection_string)
                .await
                .context("Translation failed")?;

            if json {
                let out = serde_json::json!({
                    "endpoint": event_hub.endpoint(),
                    "entity_path": event_hub.entity_path,
                    "connection_string": event_hub.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", event_hub);
            }
        }

        Commands::Token {
            connection_string,
            ttl,
        } => {
            let iothub = IotHubConnectionString::parse(&connection_string)?;
            let token = SasToken::generate(
                &iothub.events_resource_uri(),
                &iothub.shared_access_key,
                &iothub.shared_access_key_name,
                ttl,
            )?;

            if json {
                let out = serde_json::json!({
                    "token": token.to_string(),
                    "expiry": token.expiry,
                    "username": iothub.amqp_username()?,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", token);
            }
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/health", cli.api_url))
                .send()
                .await;

            let resp = match response {
                Ok(resp) => resp,
                Err(e) => {
                    eprintln!("Cannot connect to telemetry bridge at {}", cli.api_url);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Make sure the bridge is running:");
                    eprintln!("  telemetry-bridge --config config.toml");
                    std::process::exit(1);
                }
            };
            if !resp.status().is_success() {
                bail!("API returned error: {}", resp.status());
            }

            let health: serde_json::Value = resp.json().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&health)?);
                return Ok(());
            }

            println!("Telemetry Bridge v{}", health["version"].as_str().unwrap_or("?"));
            println!();
            println!("Status:      {}", health["status"].as_str().unwrap_or("unknown"));
            println!("Relay:       {}", health["relay"]["state"].as_str().unwrap_or("unknown"));
            if let Some(path) = health["relay"]["entity_path"].as_str() {
                println!("Event Hub:   {}", path);
            }
            if let Some(partitions) = health["relay"]["partitions"].as_array() {
                println!("Partitions:  {}", partitions.len());
            }
            if let Some(error) = health["relay"]["error"].as_str() {
                println!("Error:       {}", error);
            }
            println!("Devices:     {}", health["devices"].as_u64().unwrap_or(0));
            println!("Connections: {}", health["connections"].as_u64().unwrap_or(0));
            if let Some(uptime) = health["uptime_seconds"].as_u64() {
                println!("Uptime:      {}", format_duration(uptime));
            }
        }

        Commands::Devices { device } => {
            let url = match &device {
                Some(id) => format!("{}/api/v1/devices/{}/readings", cli.api_url, id),
                None => format!("{}/api/v1/devices", cli.api_url),
            };
            let response = client.get(url).send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let body: serde_json::Value = response.json().await.unwrap_or_default();
                bail!(
                    "Request failed ({}): {}",
                    status,
                    body["error"]["message"].as_str().unwrap_or("unknown error")
                );
            }

            let body: serde_json::Value = response.json().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else if device.is_some() {
                print_readings(&body);
            } else {
                print_devices(&body);
            }
        }

        Commands::Config { output, show, path } => {
            let config = if show {
                let resolved = Config::resolve(path.as_deref())?.redacted();
                toml::to_string_pretty(&resolved).context("Failed to render config")?
            } else {
                generate_default_config()
            };

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn print_devices(body: &serde_json::Value) {
    let devices = body["devices"].as_array().cloned().unwrap_or_default();
    if devices.is_empty() {
        println!("No devices have reported yet.");
        return;
    }

    let selected = body["selected"].as_str();
    println!("{}", body["label"].as_str().unwrap_or(""));
    println!("{}", "-".repeat(40));
    for device in devices {
        let id = device.as_str().unwrap_or("-");
        let marker = if Some(id) == selected { "*" } else { " " };
        println!("{} {}", marker, id);
    }
}

fn print_readings(body: &serde_json::Value) {
    let readings = body["readings"].as_array().cloned().unwrap_or_default();
    println!(
        "{} ({} of {} readings)",
        body["device_id"].as_str().unwrap_or("-"),
        readings.len(),
        body["capacity"].as_u64().unwrap_or(0)
    );
    println!("{:<30} {:>12} {:>10}", "Time", "Temperature", "Humidity");
    println!("{}", "-".repeat(54));
    for reading in readings {
        println!(
            "{:<30} {:>12} {:>10}",
            reading["time"].as_str().unwrap_or("-"),
            format_metric(&reading["temperature"]),
            format_metric(&reading["humidity"])
        );
    }
}

fn format_metric(value: &serde_json::Value) -> String {
    value
        .as_f64()
        .map(|v| format!("{:.1}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
