//! # Handler Dispatch
//!
//! A ready-made [`ConfigClientListener`] that keeps application state in
//! step with the store: one [`SyncHandler`] per key, re-read on start, on
//! change, and after every recovery.

use std::marker::PhantomData;
use std::time::Instant;

use serde::de::DeserializeOwned;

use crate::error::ClientResult;
use crate::listener::{isolate, ConfigClientListener};
use crate::resilient::ConfigClient;

/// Applies the current value of one key.
pub trait SyncHandler: Send + Sync {
    /// The key this handler owns.
    fn key(&self) -> &str;

    /// Re-reads the key through `client` and applies it.
    fn sync(&self, client: &ConfigClient) -> ClientResult<()>;
}

/// Decodes a JSON value and hands it to a closure.
///
/// The closure receives `None` when the key is absent.
pub struct JsonSyncHandler<T, F> {
    key: String,
    apply: F,
    _value: PhantomData<fn() -> T>,
}

impl<T, F> JsonSyncHandler<T, F>
where
    T: DeserializeOwned,
    F: Fn(Option<T>) + Send + Sync,
{
    pub fn new(key: impl Into<String>, apply: F) -> Self {
        JsonSyncHandler {
            key: key.into(),
            apply,
            _value: PhantomData,
        }
    }
}

impl<T, F> SyncHandler for JsonSyncHandler<T, F>
where
    T: DeserializeOwned,
    F: Fn(Option<T>) + Send + Sync,
{
    fn key(&self) -> &str {
        &self.key
    }

    fn sync(&self, client: &ConfigClient) -> ClientResult<()> {
        let value = client.get::<T>(&self.key)?;
        (self.apply)(value);
        Ok(())
    }
}

/// Listener that routes change notices to per-key handlers.
#[derive(Default)]
pub struct SyncListener {
    handlers: Vec<Box<dyn SyncHandler>>,
}

impl SyncListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler. Builder style.
    pub fn with_handler(mut self, handler: impl SyncHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|handler| handler.key())
    }

    fn sync_all(&self, client: &ConfigClient) {
        for handler in &self.handlers {
            sync_one(client, handler.as_ref());
        }
    }
}

fn sync_one(client: &ConfigClient, handler: &dyn SyncHandler) {
    let start = Instant::now();
    let mut outcome = None;
    isolate("sync", || outcome = Some(handler.sync(client)));
    match outcome {
        Some(Ok(())) => tracing::info!(
            key = handler.key(),
            cost_ms = start.elapsed().as_millis() as u64,
            "config synced"
        ),
        Some(Err(err)) => tracing::error!(key = handler.key(), error = %err, "config sync failed"),
        // Panic already logged by `isolate`.
        None => {}
    }
}

impl ConfigClientListener for SyncListener {
    fn on_initialized(&self, client: &ConfigClient) {
        self.sync_all(client);
    }

    fn on_changed(&self, client: &ConfigClient, key: &str) {
        match self.handlers.iter().find(|handler| handler.key() == key) {
            Some(handler) => sync_one(client, handler.as_ref()),
            None => tracing::error!(key, "no sync handler registered for changed key"),
        }
    }

    fn on_closed(&self, client: &ConfigClient) {
        tracing::error!(
            host = %client.host(),
            channel = client.channel(),
            "config subscription lost, changes may be missed until it recovers"
        );
    }

    fn on_recovered(&self, client: &ConfigClient) {
        tracing::info!(
            host = %client.host(),
            channel = client.channel(),
            "config subscription recovered, re-syncing every key"
        );
        self.sync_all(client);
    }
}
