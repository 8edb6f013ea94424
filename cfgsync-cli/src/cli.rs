//! Command line interface for the `cfgsync` binary.
//!
//! Global flags override the matching fields of an optional JSON config file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use cfgsync_client::ClientConfig;
use clap::{Parser, Subcommand};

/// Command line arguments for the `cfgsync` binary.
#[derive(Debug, Parser)]
#[command(name = "cfgsync", version, about = "Read, write and watch propagated configuration")]
pub struct Cli {
    /// JSON file holding a client config (`host`, `channel`, `timeout_ms`, ...).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Server address as `hostname:port`.
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Change-notice channel.
    #[arg(long, global = true)]
    pub channel: Option<String>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Log filter, e.g. `debug` or `cfgsync_client=trace`. Falls back to `RUST_LOG`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the value stored under a key.
    Get { key: String },
    /// Store a JSON value under a key and announce it.
    Set { key: String, value: String },
    /// Delete a key and announce it if it existed.
    Delete { key: String },
    /// Announce a key without changing its value.
    Notify { key: String },
    /// Publish a raw message on a channel.
    Publish { channel: String, message: String },
    /// Subscribe and print every change until interrupted.
    Watch {
        /// Only report these keys. Reports every key when empty.
        keys: Vec<String>,
    },
}

impl Cli {
    /// Loads the config file (if any) and applies flag overrides.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => ClientConfig::default(),
        };
        if let Some(host) = &self.host {
            config.subscribe.host = host.clone();
        }
        if let Some(channel) = &self.channel {
            config.subscribe.channel = channel.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout = Duration::from_millis(timeout_ms);
            config.subscribe.connect_timeout = config.timeout;
        }
        Ok(config)
    }
}
