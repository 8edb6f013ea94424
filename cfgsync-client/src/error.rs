//! # Client Errors
//!
//! One taxonomy for every client in this crate:
//! bad input, protocol mismatch, remote error reply, and connection loss.

use std::io;

use cfgsync_common::{RespError, RespValue};
use thiserror::Error;

/// Result type for the client crate.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected before any network I/O: bad key, host, channel or timeout.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed framing, or a reply of the wrong shape for the command.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with an error reply.
    #[error("remote error: {0}")]
    Remote(String),

    /// Connect, read or write failed (timeouts included), or the stream ended.
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    /// The value codec could not encode or decode a payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ClientError::InvalidArgument(message.into())
    }

    /// Maps a reply that matched none of the expected shapes. Error replies
    /// become [`ClientError::Remote`]; anything else is a protocol mismatch.
    pub(crate) fn unexpected(command: &str, expected: &str, actual: &RespValue) -> Self {
        match actual {
            RespValue::Error(message) => {
                ClientError::Remote(String::from_utf8_lossy(message).into_owned())
            }
            other => ClientError::Protocol(format!(
                "unexpected reply to `{}`: expected {}, got `{}`",
                command, expected, other
            )),
        }
    }
}

impl From<RespError> for ClientError {
    fn from(err: RespError) -> Self {
        match err {
            RespError::Io(err) => ClientError::Connection(err),
            RespError::Incomplete => ClientError::Connection(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended before the reply was complete",
            )),
            other => ClientError::Protocol(other.to_string()),
        }
    }
}
