//! # Subscribe Client
//!
//! Purpose: Hold one long-lived SUBSCRIBE connection, deliver pushed messages
//! in order, and detect a dead peer with PING/PONG.
//!
//! ## Design Principles
//! 1. **One Socket, Two Threads**: A reader thread owns the read half; a
//!    heartbeat thread shares the write half with the owner under one lock.
//! 2. **No Read Timeout**: The socket idles between messages, so liveness
//!    comes from the heartbeat: a PING still unanswered at the next tick
//!    closes the connection.
//! 3. **Single Close Path**: EOF, read faults, heartbeat loss and the owner
//!    all funnel into one idempotent `close`.
//! 4. **Isolated Callbacks**: Handler panics are logged, never fatal.
//!
//! ## Structure Overview
//!
//! ```text
//! SubscribeClient
//!   └── inner: Arc<Inner>
//!         ├── state: AtomicState          (Uninitialized -> Normal -> Closed)
//!         ├── unconfirmed_pings: AtomicUsize
//!         └── io: Mutex<Io>
//!               ├── conn: Connection      (write half, shut down on close)
//!               ├── reader: JoinHandle    ("cfgsync-subscriber")
//!               └── heartbeat             ("cfgsync-heartbeat", stop channel)
//! ```

use std::net::TcpStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use bytes::Bytes;
use cfgsync_common::{AtomicState, Command, ConnectionState, RespReader, RespValue};
use parking_lot::Mutex;

use crate::config::{validate_channel, validate_timeout, HostAddr, SubscribeConfig};
use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::listener::isolate;

/// Callbacks raised by a [`SubscribeClient`].
pub trait SubscribeEvents: Send + Sync {
    /// A `message` push arrived on the subscribed channel.
    fn on_message(&self, payload: &[u8]);

    /// The connection was lost or closed with the callback enabled.
    fn on_closed(&self);
}

/// Long-lived subscription to a single channel.
///
/// Create with [`SubscribeClient::new`], then call [`init`](Self::init).
/// Dropping the client closes it without raising `on_closed`.
pub struct SubscribeClient {
    inner: Arc<Inner>,
}

struct Inner {
    host: HostAddr,
    config: SubscribeConfig,
    events: Arc<dyn SubscribeEvents>,
    state: AtomicState,
    // PINGs sent with no PONG seen yet.
    unconfirmed_pings: AtomicUsize,
    io: Mutex<Io>,
}

#[derive(Default)]
struct Io {
    conn: Option<Connection>,
    reader: Option<JoinHandle<()>>,
    heartbeat: Option<Heartbeat>,
}

struct Heartbeat {
    // Dropping the sender wakes the heartbeat thread and stops it.
    stop: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl SubscribeClient {
    /// Validates the config. No connection is made until `init`.
    pub fn new(config: SubscribeConfig, events: Arc<dyn SubscribeEvents>) -> ClientResult<Self> {
        validate_channel(&config.channel)?;
        validate_timeout(config.connect_timeout)?;
        let host = config.host.parse()?;
        Ok(SubscribeClient {
            inner: Arc::new(Inner {
                host,
                config,
                events,
                state: AtomicState::new(),
                unconfirmed_pings: AtomicUsize::new(0),
                io: Mutex::new(Io::default()),
            }),
        })
    }

    /// Connects, subscribes, and starts the reader and heartbeat threads.
    ///
    /// No-op once past `Uninitialized`. On failure the client is closed
    /// without raising `on_closed` and the error is returned.
    pub fn init(&self) -> ClientResult<()> {
        let inner = &self.inner;
        let mut io = inner.io.lock();
        if inner.state.load() != ConnectionState::Uninitialized {
            return Ok(());
        }

        let start = Instant::now();
        match inner.start(&mut io) {
            Ok(()) => {
                inner
                    .state
                    .transition(ConnectionState::Uninitialized, ConnectionState::Normal);
                tracing::info!(
                    host = %inner.host,
                    channel = %inner.config.channel,
                    ping_period_ms = inner.config.ping_period.as_millis() as u64,
                    cost_ms = start.elapsed().as_millis() as u64,
                    "subscribe client initialized"
                );
                Ok(())
            }
            Err(err) => {
                drop(io);
                tracing::error!(
                    host = %inner.host,
                    channel = %inner.config.channel,
                    error = %err,
                    "subscribe client init failed"
                );
                inner.close(false);
                Err(err)
            }
        }
    }

    /// Closes the connection and raises `on_closed`. Idempotent.
    pub fn close(&self) {
        self.inner.close(true);
    }

    /// Closes the connection without raising `on_closed`. Idempotent.
    pub fn close_quietly(&self) {
        self.inner.close(false);
    }

    /// True while subscribed.
    pub fn is_active(&self) -> bool {
        self.inner.state.is_normal()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.load()
    }

    pub fn host(&self) -> &HostAddr {
        &self.inner.host
    }

    pub fn channel(&self) -> &str {
        &self.inner.config.channel
    }
}

impl Drop for SubscribeClient {
    fn drop(&mut self) {
        self.inner.close(false);
    }
}

impl Inner {
    fn start(self: &Arc<Self>, io: &mut Io) -> ClientResult<()> {
        let timeout = self.config.connect_timeout;
        // The handshake read is bounded; the timeout is lifted once subscribed.
        let (mut conn, mut reader) = Connection::open(&self.host, timeout, Some(timeout), Some(timeout))?;

        conn.send(&Command::new("SUBSCRIBE").arg(Bytes::from(self.config.channel.clone())))?;
        let reply = reader.read_value()?.ok_or_else(|| {
            ClientError::Connection(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before SUBSCRIBE was confirmed",
            ))
        })?;
        if !reply.is_push("subscribe", 3) {
            return Err(ClientError::unexpected(
                "SUBSCRIBE",
                "`[subscribe, channel, count]`",
                &reply,
            ));
        }
        conn.set_read_timeout(None)?;
        io.conn = Some(conn);

        let inner = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("cfgsync-subscriber".to_string())
            .spawn(move || inner.read_loop(reader))?;
        io.reader = Some(handle);

        if !self.config.ping_period.is_zero() {
            let (stop, stop_rx) = mpsc::channel();
            let inner = Arc::clone(self);
            let join = thread::Builder::new()
                .name("cfgsync-heartbeat".to_string())
                .spawn(move || inner.heartbeat_loop(stop_rx))?;
            io.heartbeat = Some(Heartbeat { stop, join });
        }
        Ok(())
    }

    fn read_loop(self: Arc<Self>, mut reader: RespReader<TcpStream>) {
        loop {
            match reader.read_value() {
                Ok(Some(value)) => self.dispatch(value),
                Ok(None) => {
                    tracing::info!(
                        host = %self.host,
                        channel = %self.config.channel,
                        "subscription stream ended"
                    );
                    break;
                }
                Err(err) => {
                    // A read failing after close is just the shutdown landing.
                    if self.state.load() != ConnectionState::Closed {
                        tracing::error!(
                            host = %self.host,
                            channel = %self.config.channel,
                            error = %err,
                            "subscription read failed"
                        );
                    }
                    break;
                }
            }
        }
        self.close(true);
    }

    fn dispatch(&self, value: RespValue) {
        if value.is_push("message", 3) {
            let payload = value.as_array().and_then(|items| items[2].as_bytes());
            match payload {
                Some(payload) => isolate("on_message", || self.events.on_message(payload)),
                None => tracing::warn!(
                    host = %self.host,
                    channel = %self.config.channel,
                    push = %value,
                    "message push without payload"
                ),
            }
        } else if value.is_push("pong", 2) {
            let _ = self
                .unconfirmed_pings
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
            tracing::debug!(host = %self.host, channel = %self.config.channel, "PONG");
        } else if let RespValue::Error(message) = &value {
            tracing::error!(
                host = %self.host,
                channel = %self.config.channel,
                message = %String::from_utf8_lossy(message),
                "server error on subscription"
            );
        } else {
            tracing::warn!(
                host = %self.host,
                channel = %self.config.channel,
                push = %value,
                "unrecognized push on subscription"
            );
        }
    }

    fn heartbeat_loop(self: Arc<Self>, stop: mpsc::Receiver<()>) {
        let period = self.config.ping_period;
        loop {
            match stop.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            }
            if !self.beat() {
                return;
            }
        }
    }

    /// One heartbeat tick. Returns false once the connection is gone.
    fn beat(&self) -> bool {
        if self.unconfirmed_pings.load(Ordering::Acquire) > 0 {
            tracing::error!(
                host = %self.host,
                channel = %self.config.channel,
                "previous PING was never answered, closing subscription"
            );
            self.close(true);
            return false;
        }

        self.unconfirmed_pings.fetch_add(1, Ordering::AcqRel);
        let sent = {
            let mut io = self.io.lock();
            match io.conn.as_mut() {
                Some(conn) => conn.send(&Command::new("PING")),
                None => return false,
            }
        };
        match sent {
            Ok(()) => {
                tracing::debug!(host = %self.host, channel = %self.config.channel, "PING sent");
                true
            }
            Err(err) => {
                tracing::error!(
                    host = %self.host,
                    channel = %self.config.channel,
                    error = %err,
                    "PING failed, closing subscription"
                );
                self.close(true);
                false
            }
        }
    }

    fn close(&self, notify: bool) {
        let (previous, conn, reader, heartbeat) = {
            let mut io = self.io.lock();
            let previous = self.state.close();
            if previous == ConnectionState::Closed {
                return;
            }
            (previous, io.conn.take(), io.reader.take(), io.heartbeat.take())
        };

        let start = Instant::now();
        // Shut the socket first so a blocked reader wakes up before the joins.
        drop(conn);
        if let Some(heartbeat) = heartbeat {
            drop(heartbeat.stop);
            join_unless_current(heartbeat.join, "heartbeat");
        }
        if let Some(reader) = reader {
            join_unless_current(reader, "subscriber");
        }
        tracing::info!(
            host = %self.host,
            channel = %self.config.channel,
            cost_ms = start.elapsed().as_millis() as u64,
            "subscribe client closed"
        );

        // A client that never reached Normal has nothing to report.
        if notify && previous == ConnectionState::Normal {
            isolate("on_closed", || self.events.on_closed());
        }
    }
}

/// Joins a worker thread unless the caller is that thread.
pub(crate) fn join_unless_current(handle: JoinHandle<()>, name: &str) {
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        tracing::error!(thread = name, "worker thread panicked");
    }
}
