//! # One-Shot Client
//!
//! Purpose: Issue GET/SET/DEL/PUBLISH with one fresh connection per call.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `OneShotClient` hides sockets and RESP framing.
//! 2. **Validate First**: Keys are checked before any I/O.
//! 3. **Strict Replies**: Each command accepts exactly one reply shape.
//! 4. **Always Close**: The connection is dropped (and shut down) on every
//!    exit path; nothing is retried here.

use std::time::{Duration, Instant};

use bytes::Bytes;
use cfgsync_common::{Command, RespValue};

use crate::config::{validate_key, validate_timeout, HostAddr, OneShotConfig};
use crate::connection::{exec, Connection};
use crate::error::{ClientError, ClientResult};

/// Request/response client that opens one connection per operation.
#[derive(Debug, Clone)]
pub struct OneShotClient {
    host: HostAddr,
    timeout: Duration,
}

impl OneShotClient {
    /// Creates a client for `host` with the default 30 s timeout.
    pub fn connect(host: &str) -> ClientResult<Self> {
        Self::with_config(OneShotConfig {
            host: host.to_string(),
            ..OneShotConfig::default()
        })
    }

    /// Creates a client from a config. Fails on a malformed host or a zero timeout.
    pub fn with_config(config: OneShotConfig) -> ClientResult<Self> {
        validate_timeout(config.timeout)?;
        let host = config.host.parse()?;
        Ok(OneShotClient {
            host,
            timeout: config.timeout,
        })
    }

    /// Server address this client talks to.
    pub fn host(&self) -> &HostAddr {
        &self.host
    }

    /// Fetches a value by key.
    ///
    /// Returns `Ok(None)` when the key is missing.
    pub fn get(&self, key: &str) -> ClientResult<Option<Bytes>> {
        let key_bytes = validate_key(key)?;
        let command = Command::new("GET").arg(Bytes::copy_from_slice(key_bytes));
        match self.execute(&command, key)? {
            RespValue::BulkString(data) => Ok(data),
            other => Err(ClientError::unexpected("GET", "bulk string", &other)),
        }
    }

    /// Stores a value for a key. The server must answer `+OK`.
    pub fn set(&self, key: &str, value: &[u8]) -> ClientResult<()> {
        let key_bytes = validate_key(key)?;
        let command = Command::new("SET")
            .arg(Bytes::copy_from_slice(key_bytes))
            .arg(Bytes::copy_from_slice(value));
        match self.execute(&command, key)? {
            RespValue::SimpleString(text) if &text[..] == b"OK" => Ok(()),
            other => Err(ClientError::unexpected("SET", "`+OK`", &other)),
        }
    }

    /// Deletes a key. Returns true when exactly one key was removed.
    pub fn delete(&self, key: &str) -> ClientResult<bool> {
        let key_bytes = validate_key(key)?;
        let command = Command::new("DEL").arg(Bytes::copy_from_slice(key_bytes));
        let reply = self.execute(&command, key)?;
        match reply.as_integer() {
            Some(count) => Ok(count == 1),
            None => Err(ClientError::unexpected("DEL", "integer", &reply)),
        }
    }

    /// Publishes a message. Returns how many subscribers received it.
    ///
    /// Any channel name is passed through, the empty one included.
    pub fn publish(&self, channel: &str, message: &[u8]) -> ClientResult<i64> {
        let command = Command::new("PUBLISH")
            .arg(Bytes::copy_from_slice(channel.as_bytes()))
            .arg(Bytes::copy_from_slice(message));
        let reply = self.execute(&command, channel)?;
        reply
            .as_integer()
            .ok_or_else(|| ClientError::unexpected("PUBLISH", "integer", &reply))
    }

    /// Opens a connection, runs one command, and drops the connection.
    fn execute(&self, command: &Command, target: &str) -> ClientResult<RespValue> {
        let start = Instant::now();
        let result = Connection::open(&self.host, self.timeout, Some(self.timeout), Some(self.timeout))
            .and_then(|(mut conn, mut reader)| exec(&mut conn, &mut reader, command));

        match &result {
            Ok(RespValue::Error(message)) => tracing::error!(
                host = %self.host,
                command = %command.name(),
                key = target,
                message = %String::from_utf8_lossy(message),
                "server returned an error reply"
            ),
            Ok(_) => tracing::debug!(
                host = %self.host,
                command = %command.name(),
                key = target,
                cost_ms = start.elapsed().as_millis() as u64,
                "command completed"
            ),
            Err(err) => tracing::error!(
                host = %self.host,
                command = %command.name(),
                key = target,
                error = %err,
                "command failed"
            ),
        }
        result
    }
}
