//! # Decode Errors
//!
//! Failures raised while turning a byte stream into [`RespValue`]s.
//!
//! [`RespValue`]: crate::resp::RespValue

use std::io;

use thiserror::Error;

/// Result alias for RESP decoding.
pub type RespResult<T> = Result<T, RespError>;

/// Errors surfaced by [`RespReader`](crate::resp::RespReader).
#[derive(Debug, Error)]
pub enum RespError {
    /// Underlying stream failed while reading.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Stream ended in the middle of a value.
    #[error("stream ended before the value was complete")]
    Incomplete,

    /// First byte does not name any RESP type.
    #[error("unknown first byte: `{0:#04x}`")]
    UnknownType(u8),

    /// Length or count field is not a valid size.
    #[error("invalid length field: `{0}`")]
    InvalidLength(String),

    /// A CR was not followed by LF.
    #[error("expected LF after CR, found `{0:#04x}`")]
    InvalidLineEnding(u8),

    /// Arrays nested deeper than the reader accepts.
    #[error("arrays nested deeper than {0} levels")]
    TooDeep(usize),

    /// Integer reply is not decimal text.
    #[error("invalid integer: `{0}`")]
    InvalidInteger(String),
}

impl RespError {
    /// Returns true when the error means the peer or the socket went away,
    /// as opposed to the peer speaking malformed RESP.
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, RespError::Io(_) | RespError::Incomplete)
    }
}
