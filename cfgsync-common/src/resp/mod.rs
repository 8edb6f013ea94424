//! # RESP2 Encoding and Parsing
//!
//! Purpose: Encode client commands and decode server replies/pushes straight
//! from a byte stream, with no Redis client library in between.
//!
//! ## Design Principles
//! 1. **Closed Value Model**: Five variants, only bulk strings and arrays nullable.
//! 2. **Commands Are Arrays**: Every request is an array of bulk strings.
//! 3. **Binary-Safe**: Payloads are raw bytes (`bytes::Bytes`), never re-encoded.
//! 4. **Fail Fast**: Bad framing and truncated values are errors, never partial values.

mod reader;
mod value;
mod writer;

pub use reader::{RespReader, MAX_NESTING};
pub use value::RespValue;
pub use writer::{encode_value, Command};
