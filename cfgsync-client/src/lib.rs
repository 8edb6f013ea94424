//! # cfgsync Client
//!
//! Purpose: Propagate configuration changes through a Redis-compatible server.
//! Writers store a value and PUBLISH its key on a channel; readers hold a
//! SUBSCRIBE connection and re-read the key whenever it is announced.
//!
//! ## Design Principles
//! 1. **Short-Lived Requests**: Reads and writes open one connection per call
//!    ([`OneShotClient`]), so no pool state can go stale.
//! 2. **Long-Lived Subscription**: [`SubscribeClient`] owns the single
//!    SUBSCRIBE socket with reader and heartbeat threads.
//! 3. **Self-Healing**: [`ConfigClient`] supervises the subscription and
//!    replaces it after any loss, telling the listener to re-sync.
//! 4. **Typed Values**: Values travel as opaque bytes; JSON helpers sit on top.
//!
//! ## Structure Overview
//!
//! ```text
//! ConfigManager ──SET/DEL/PUBLISH──┐
//!                                  ▼
//!                              server ──message──► SubscribeClient
//!                                  ▲                    │ on_message / on_closed
//!         OneShotClient ◄──GET─────┘                    ▼
//!                                                 ConfigClient ──► ConfigClientListener
//!                                                       └── rescue loop (on loss)
//! ```

mod codec;
mod config;
mod connection;
mod error;
mod listener;
mod manager;
mod oneshot;
mod resilient;
mod subscribe;
mod sync;

pub use cfgsync_common::ConnectionState;
pub use codec::{decode_value, encode_value};
pub use config::{
    validate_key, ClientConfig, HostAddr, OneShotConfig, SubscribeConfig, DEFAULT_PING_PERIOD,
    DEFAULT_RESCUE_DELAY, DEFAULT_TIMEOUT, MAX_KEY_LENGTH,
};
pub use error::{ClientError, ClientResult};
pub use listener::{ConfigClientListener, NoopListener};
pub use manager::ConfigManager;
pub use oneshot::OneShotClient;
pub use resilient::ConfigClient;
pub use subscribe::{SubscribeClient, SubscribeEvents};
pub use sync::{JsonSyncHandler, SyncHandler, SyncListener};
