//! `cfgsync` operator binary.
//!
//! Thin wrapper over `cfgsync-client`: one-shot reads and writes, plus a
//! `watch` mode that keeps a resilient subscription open and prints changes.

mod cli;

use std::io::Write;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use cfgsync_client::{
    ClientConfig, ConfigClient, ConfigClientListener, ConfigManager, OneShotClient,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let config = cli.client_config()?;
    match cli.command {
        Command::Get { key } => {
            let client = OneShotClient::with_config(config.one_shot())?;
            match client.get(&key)? {
                Some(value) => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&value)?;
                    stdout.write_all(b"\n")?;
                }
                None => eprintln!("{key}: not found"),
            }
        }
        Command::Set { key, value } => {
            let value: serde_json::Value = serde_json::from_str(&value)
                .with_context(|| format!("value for `{key}` is not valid JSON"))?;
            let receivers = manager(&config)?.set(&key, &value)?;
            println!("{key}: stored, {receivers} subscriber(s) notified");
        }
        Command::Delete { key } => {
            let receivers = manager(&config)?.delete(&key)?;
            println!("{key}: deleted, {receivers} subscriber(s) notified");
        }
        Command::Notify { key } => {
            let receivers = manager(&config)?.notify(&key)?;
            println!("{key}: {receivers} subscriber(s) notified");
        }
        Command::Publish { channel, message } => {
            let client = OneShotClient::with_config(config.one_shot())?;
            let receivers = client.publish(&channel, message.as_bytes())?;
            println!("{receivers}");
        }
        Command::Watch { keys } => watch(config, keys)?,
    }
    Ok(())
}

fn init_logging(level: Option<&str>) {
    // Logs go to stderr so values printed on stdout stay pipeable.
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn manager(config: &ClientConfig) -> Result<ConfigManager> {
    ConfigManager::with_config(config.one_shot(), config.subscribe.channel.clone())
        .context("building config manager")
}

fn watch(config: ClientConfig, keys: Vec<String>) -> Result<()> {
    let client = ConfigClient::new(config, Arc::new(PrintListener { keys }))?;
    client.init().context("opening subscription")?;
    // Runs until the process is interrupted.
    loop {
        thread::park();
    }
}

/// Prints each announced key with its current value.
struct PrintListener {
    keys: Vec<String>,
}

impl ConfigClientListener for PrintListener {
    fn on_initialized(&self, client: &ConfigClient) {
        eprintln!("watching `{}` on {}", client.channel(), client.host());
    }

    fn on_changed(&self, client: &ConfigClient, key: &str) {
        if !self.keys.is_empty() && !self.keys.iter().any(|k| k == key) {
            return;
        }
        match client.get_bytes(key) {
            Ok(Some(value)) => println!("{key} = {}", String::from_utf8_lossy(&value)),
            Ok(None) => println!("{key} (deleted)"),
            Err(err) => tracing::error!(key, error = %err, "re-read after change failed"),
        }
    }

    fn on_closed(&self, client: &ConfigClient) {
        eprintln!("subscription to {} lost, reconnecting", client.host());
    }

    fn on_recovered(&self, client: &ConfigClient) {
        eprintln!("subscription to {} restored, changes during the gap were missed", client.host());
    }
}
