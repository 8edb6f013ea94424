//! # Listener Contract
//!
//! Callbacks a [`ConfigClient`] raises toward the application. Every method
//! has a no-op default so listeners override only what they need.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::resilient::ConfigClient;

/// Receives lifecycle and change events from a [`ConfigClient`].
///
/// Calls arrive on the client's background threads. A panic inside a callback
/// is caught and logged; it never stops the thread that raised it.
pub trait ConfigClientListener: Send + Sync {
    /// The first subscription is up.
    fn on_initialized(&self, _client: &ConfigClient) {}

    /// `key` was announced as changed; re-read it through `client`.
    fn on_changed(&self, _client: &ConfigClient, _key: &str) {}

    /// The subscription was lost. A reconnect loop is already running.
    fn on_closed(&self, _client: &ConfigClient) {}

    /// A new subscription replaced the lost one. Changes published during the
    /// gap were missed, so authoritative state should be re-read.
    fn on_recovered(&self, _client: &ConfigClient) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ConfigClientListener for NoopListener {}

/// Runs a callback, logging instead of unwinding if it panics.
pub(crate) fn isolate<F: FnOnce()>(callback: &'static str, f: F) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(callback, reason = %reason, "callback panicked");
    }
}
