use std::borrow::Cow;
use std::fmt::Write;

use bytes::{BufMut, Bytes, BytesMut};

use super::value::RespValue;

const CRLF: &[u8] = b"\r\n";

/// A command ready to be written: the name followed by its arguments, always
/// framed as an array of bulk strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    /// Starts a command with its name, e.g. `Command::new("GET")`.
    pub fn new(name: &'static str) -> Self {
        Command {
            args: vec![Bytes::from_static(name.as_bytes())],
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Command name, for logging.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.args[0])
    }

    /// Name and arguments, in wire order.
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Encodes the command into the provided buffer.
    pub fn encode_into(&self, out: &mut BytesMut) {
        out.put_u8(b'*');
        push_usize(out, self.args.len());
        out.extend_from_slice(CRLF);
        for arg in &self.args {
            push_bulk(out, arg);
        }
    }

    /// Encodes the command into a fresh buffer.
    pub fn encode(&self) -> Bytes {
        let size = self.args.iter().map(|arg| arg.len() + 16).sum::<usize>() + 16;
        let mut out = BytesMut::with_capacity(size);
        self.encode_into(&mut out);
        out.freeze()
    }

    /// The same command as a value (array of bulk strings).
    pub fn to_value(&self) -> RespValue {
        RespValue::array(self.args.iter().cloned().map(RespValue::bulk).collect())
    }
}

/// Encodes any value in RESP2 framing.
pub fn encode_value(value: &RespValue, out: &mut BytesMut) {
    match value {
        RespValue::SimpleString(data) => push_line(out, b'+', data),
        RespValue::Error(data) => push_line(out, b'-', data),
        RespValue::Integer(data) => push_line(out, b':', data),
        RespValue::BulkString(None) => out.extend_from_slice(b"$-1\r\n"),
        RespValue::BulkString(Some(data)) => push_bulk(out, data),
        RespValue::Array(None) => out.extend_from_slice(b"*-1\r\n"),
        RespValue::Array(Some(items)) => {
            out.put_u8(b'*');
            push_usize(out, items.len());
            out.extend_from_slice(CRLF);
            for item in items {
                encode_value(item, out);
            }
        }
    }
}

fn push_line(out: &mut BytesMut, kind: u8, data: &[u8]) {
    out.put_u8(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(CRLF);
}

fn push_bulk(out: &mut BytesMut, data: &[u8]) {
    out.put_u8(b'$');
    push_usize(out, data.len());
    out.extend_from_slice(CRLF);
    out.extend_from_slice(data);
    out.extend_from_slice(CRLF);
}

fn push_usize(out: &mut BytesMut, value: usize) {
    // Formatting into a BytesMut only grows the buffer; it cannot fail.
    let _ = write!(out, "{}", value);
}
