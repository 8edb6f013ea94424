//! # Resilient Client
//!
//! Purpose: Keep one logical subscription alive across any number of lost
//! connections, and serve reads through a one-shot client.
//!
//! ## Design Principles
//! 1. **Supervisor Pattern**: `ConfigClient` owns the current
//!    [`SubscribeClient`] and replaces it whenever it is lost.
//! 2. **Never Give Up**: The rescue loop retries with a fixed delay until a
//!    new subscription is up or the client is closed.
//! 3. **One Rescue At A Time**: A dedicated mutex serializes rescue loops.
//! 4. **Quiet Shutdown**: An owner `close` tears down without `on_closed`, wakes
//!    any waiting rescue loop, and joins it.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use bytes::Bytes;
use cfgsync_common::{AtomicState, ConnectionState};
use parking_lot::{Condvar, Mutex};
use serde::de::DeserializeOwned;

use crate::codec::decode_value;
use crate::config::{validate_channel, validate_timeout, ClientConfig};
use crate::error::ClientResult;
use crate::listener::{isolate, ConfigClientListener};
use crate::oneshot::OneShotClient;
use crate::subscribe::{join_unless_current, SubscribeClient, SubscribeEvents};

/// Subscribes to a change channel and keeps that subscription alive.
///
/// Each message on the channel is treated as the key of a changed value and
/// handed to [`ConfigClientListener::on_changed`]. Cloning yields another
/// handle to the same client.
#[derive(Clone)]
pub struct ConfigClient {
    shared: Arc<Shared>,
}

struct Shared {
    config: ClientConfig,
    one_shot: OneShotClient,
    listener: Arc<dyn ConfigClientListener>,
    state: AtomicState,
    // Guards init/close transitions and the current subscription.
    current: Mutex<Option<SubscribeClient>>,
    // Held for the whole life of a rescue loop.
    rescue_lock: Mutex<()>,
    rescues: Mutex<Vec<JoinHandle<()>>>,
    // Retry waits park here; `close` wakes them.
    sleep_lock: Mutex<()>,
    wakeup: Condvar,
}

/// Bridges subscription events back to the supervisor without keeping it alive.
struct SupervisorEvents {
    shared: Weak<Shared>,
}

impl ConfigClient {
    /// Validates the config. Call [`init`](Self::init) to subscribe.
    pub fn new(config: ClientConfig, listener: Arc<dyn ConfigClientListener>) -> ClientResult<Self> {
        validate_channel(&config.subscribe.channel)?;
        validate_timeout(config.subscribe.connect_timeout)?;
        let one_shot = OneShotClient::with_config(config.one_shot())?;
        Ok(ConfigClient {
            shared: Arc::new(Shared {
                config,
                one_shot,
                listener,
                state: AtomicState::new(),
                current: Mutex::new(None),
                rescue_lock: Mutex::new(()),
                rescues: Mutex::new(Vec::new()),
                sleep_lock: Mutex::new(()),
                wakeup: Condvar::new(),
            }),
        })
    }

    /// Opens the first subscription and raises `on_initialized`.
    ///
    /// No-op once initialized or closed. A failure leaves the client
    /// uninitialized, so `init` may be retried.
    pub fn init(&self) -> ClientResult<()> {
        let shared = &self.shared;
        {
            let mut current = shared.current.lock();
            if shared.state.load() != ConnectionState::Uninitialized {
                return Ok(());
            }
            let client = Shared::subscribe(shared).map_err(|err| {
                tracing::error!(
                    host = %shared.one_shot.host(),
                    channel = %shared.config.subscribe.channel,
                    error = %err,
                    "config client init failed"
                );
                err
            })?;
            *current = Some(client);
            shared
                .state
                .transition(ConnectionState::Uninitialized, ConnectionState::Normal);
        }
        isolate("on_initialized", || shared.listener.on_initialized(self));
        Ok(())
    }

    /// Closes the subscription without raising `on_closed`, cancels any
    /// rescue loop and waits for it to exit. Idempotent.
    pub fn close(&self) {
        let shared = &self.shared;
        let current = {
            let mut current = shared.current.lock();
            if shared.state.close() == ConnectionState::Closed {
                return;
            }
            current.take()
        };

        {
            let _guard = shared.sleep_lock.lock();
            shared.wakeup.notify_all();
        }
        if let Some(client) = current {
            client.close_quietly();
        }
        let rescues = std::mem::take(&mut *shared.rescues.lock());
        for handle in rescues {
            join_unless_current(handle, "rescue");
        }
        tracing::info!(
            host = %shared.one_shot.host(),
            channel = %shared.config.subscribe.channel,
            "config client closed"
        );
    }

    /// Reads the raw bytes stored under `key`. Works whatever the state of
    /// the subscription.
    pub fn get_bytes(&self, key: &str) -> ClientResult<Option<Bytes>> {
        self.shared.one_shot.get(key)
    }

    /// Reads and decodes the value stored under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> ClientResult<Option<T>> {
        match self.get_bytes(key)? {
            Some(bytes) => decode_value(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// True while a live subscription is in place.
    pub fn is_active(&self) -> bool {
        self.shared
            .current
            .lock()
            .as_ref()
            .map_or(false, SubscribeClient::is_active)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.load()
    }

    /// Server address as configured, e.g. `localhost:6379`.
    pub fn host(&self) -> String {
        self.shared.one_shot.host().to_string()
    }

    pub fn channel(&self) -> &str {
        &self.shared.config.subscribe.channel
    }
}

impl Shared {
    /// Builds and initializes a subscription wired back to this supervisor.
    fn subscribe(shared: &Arc<Shared>) -> ClientResult<SubscribeClient> {
        let events: Arc<dyn SubscribeEvents> = Arc::new(SupervisorEvents {
            shared: Arc::downgrade(shared),
        });
        let client = SubscribeClient::new(shared.config.subscribe.clone(), events)?;
        client.init()?;
        Ok(client)
    }

    fn handle(self: &Arc<Self>) -> ConfigClient {
        ConfigClient {
            shared: Arc::clone(self),
        }
    }

    fn start_rescue(self: &Arc<Self>) {
        // Init may still be finishing (state not yet Normal); only an owner
        // close rules a rescue out.
        if self.state.load() == ConnectionState::Closed {
            return;
        }

        let worker = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("cfgsync-rescue".to_string())
            .spawn(move || worker.rescue_loop());
        match spawned {
            Ok(handle) => {
                let mut rescues = self.rescues.lock();
                rescues.retain(|handle| !handle.is_finished());
                rescues.push(handle);
            }
            Err(err) => tracing::error!(
                host = %self.one_shot.host(),
                channel = %self.config.subscribe.channel,
                error = %err,
                "could not spawn rescue thread"
            ),
        }
    }

    fn rescue_loop(self: Arc<Self>) {
        // The listener runs after the rescue lock is released, so it may
        // close the client even while another rescue waits on that lock.
        if self.rescue() {
            let client = self.handle();
            isolate("on_recovered", || self.listener.on_recovered(&client));
        }
    }

    /// Rebuilds the subscription. Returns false when cancelled by `close`.
    fn rescue(self: &Arc<Self>) -> bool {
        let _rescue = self.rescue_lock.lock();
        let start = Instant::now();
        tracing::info!(
            host = %self.one_shot.host(),
            channel = %self.config.subscribe.channel,
            "rescue started"
        );

        let mut attempts: u64 = 0;
        while self.state.load() != ConnectionState::Closed {
            attempts += 1;
            let client = match Shared::subscribe(self) {
                Ok(client) => client,
                Err(err) => {
                    tracing::error!(
                        host = %self.one_shot.host(),
                        channel = %self.config.subscribe.channel,
                        attempts,
                        cost_ms = start.elapsed().as_millis() as u64,
                        error = %err,
                        "rescue attempt failed"
                    );
                    self.wait_before_retry();
                    continue;
                }
            };

            let previous = {
                let mut current = self.current.lock();
                if self.state.load() == ConnectionState::Closed {
                    drop(current);
                    client.close_quietly();
                    break;
                }
                current.replace(client)
            };
            // The replaced client is already closed; dropping it is a no-op.
            drop(previous);

            tracing::info!(
                host = %self.one_shot.host(),
                channel = %self.config.subscribe.channel,
                attempts,
                cost_ms = start.elapsed().as_millis() as u64,
                "rescue succeeded"
            );
            return true;
        }

        tracing::info!(
            host = %self.one_shot.host(),
            channel = %self.config.subscribe.channel,
            attempts,
            "rescue cancelled by close"
        );
        false
    }

    fn wait_before_retry(&self) {
        let deadline = Instant::now() + self.config.rescue_delay;
        let mut guard = self.sleep_lock.lock();
        while self.state.load() != ConnectionState::Closed {
            if self.wakeup.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
    }
}

impl SubscribeEvents for SupervisorEvents {
    fn on_message(&self, payload: &[u8]) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let key = String::from_utf8_lossy(payload);
        let client = shared.handle();
        isolate("on_changed", || shared.listener.on_changed(&client, &key));
    }

    fn on_closed(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        shared.start_rescue();
        let client = shared.handle();
        isolate("on_closed", || shared.listener.on_closed(&client));
    }
}
