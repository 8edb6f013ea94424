use std::io::{ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};

use super::value::RespValue;
use crate::error::{RespError, RespResult};

/// Bytes pulled from the stream per read call.
const READ_CHUNK: usize = 8 * 1024;

/// Largest bulk string accepted (the Redis limit).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Deepest array nesting accepted. Replies used here nest at most one level.
pub const MAX_NESTING: usize = 64;

/// Decodes RESP values from a byte stream.
///
/// The reader keeps its own buffer and a scan cursor: line fields are found by
/// scanning forward for CR and then checking the following byte for LF, so no
/// byte after a complete value is ever consumed.
pub struct RespReader<R> {
    inner: R,
    buf: BytesMut,
    // Prefix of `buf` already known to hold no CR.
    scanned: usize,
}

impl<R: Read> RespReader<R> {
    pub fn new(inner: R) -> Self {
        RespReader {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
            scanned: 0,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Reads one value.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly before a new value
    /// starts. A stream ending inside a value is [`RespError::Incomplete`],
    /// including an array missing any of its elements.
    pub fn read_value(&mut self) -> RespResult<Option<RespValue>> {
        if self.buf.is_empty() && !self.fill()? {
            return Ok(None);
        }
        self.read_frame(0).map(Some)
    }

    fn read_frame(&mut self, depth: usize) -> RespResult<RespValue> {
        match self.read_byte()? {
            b'+' => Ok(RespValue::SimpleString(self.read_line()?)),
            b'-' => Ok(RespValue::Error(self.read_line()?)),
            b':' => {
                let line = self.read_line()?;
                if parse_i64(&line).is_none() {
                    return Err(RespError::InvalidInteger(lossy(&line)));
                }
                Ok(RespValue::Integer(line))
            }
            b'$' => match self.read_length()? {
                None => Ok(RespValue::BulkString(None)),
                Some(len) => {
                    let data = self.read_exact(len)?;
                    self.expect_crlf()?;
                    Ok(RespValue::BulkString(Some(data)))
                }
            },
            b'*' => match self.read_length()? {
                None => Ok(RespValue::Array(None)),
                Some(_) if depth >= MAX_NESTING => Err(RespError::TooDeep(MAX_NESTING)),
                Some(count) => {
                    let mut items = Vec::with_capacity(count.min(1024));
                    for _ in 0..count {
                        items.push(self.read_frame(depth + 1)?);
                    }
                    Ok(RespValue::Array(Some(items)))
                }
            },
            other => Err(RespError::UnknownType(other)),
        }
    }

    /// Reads a length/count line. `None` for the null marker `-1`.
    fn read_length(&mut self) -> RespResult<Option<usize>> {
        let line = self.read_line()?;
        match parse_i64(&line) {
            Some(-1) => Ok(None),
            Some(len) if (0..=MAX_BULK_LEN).contains(&len) => Ok(Some(len as usize)),
            _ => Err(RespError::InvalidLength(lossy(&line))),
        }
    }

    fn read_byte(&mut self) -> RespResult<u8> {
        if self.buf.is_empty() && !self.fill()? {
            return Err(RespError::Incomplete);
        }
        self.scanned = 0;
        Ok(self.buf.get_u8())
    }

    /// Reads up to the next CR, checks the LF after it, and drops both.
    fn read_line(&mut self) -> RespResult<Bytes> {
        loop {
            if let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == b'\r') {
                let cr = self.scanned + offset;
                while self.buf.len() <= cr + 1 {
                    if !self.fill()? {
                        return Err(RespError::Incomplete);
                    }
                }
                let next = self.buf[cr + 1];
                if next != b'\n' {
                    return Err(RespError::InvalidLineEnding(next));
                }
                let line = self.buf.split_to(cr).freeze();
                self.buf.advance(2);
                self.scanned = 0;
                return Ok(line);
            }
            self.scanned = self.buf.len();
            if !self.fill()? {
                return Err(RespError::Incomplete);
            }
        }
    }

    fn read_exact(&mut self, len: usize) -> RespResult<Bytes> {
        while self.buf.len() < len {
            if !self.fill()? {
                return Err(RespError::Incomplete);
            }
        }
        self.scanned = 0;
        Ok(self.buf.split_to(len).freeze())
    }

    fn expect_crlf(&mut self) -> RespResult<()> {
        let tail = self.read_exact(2)?;
        match tail.as_ref() {
            b"\r\n" => Ok(()),
            [b'\r', other] | [other, _] => Err(RespError::InvalidLineEnding(*other)),
            _ => Err(RespError::Incomplete),
        }
    }

    /// Pulls more bytes from the stream. Returns false at end of stream.
    fn fill(&mut self) -> RespResult<bool> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(true);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(RespError::Io(err)),
            }
        }
    }
}

fn parse_i64(data: &[u8]) -> Option<i64> {
    if data.is_empty() {
        return None;
    }
    let (negative, digits) = match data[0] {
        b'-' => (true, &data[1..]),
        _ => (false, data),
    };
    if digits.is_empty() {
        return None;
    }

    // Accumulate toward the sign so i64::MIN parses.
    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        let digit = (b - b'0') as i64;
        value = value.checked_mul(10)?;
        value = if negative {
            value.checked_sub(digit)?
        } else {
            value.checked_add(digit)?
        };
    }
    Some(value)
}

fn lossy(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_one(input: &[u8]) -> RespResult<Option<RespValue>> {
        RespReader::new(Cursor::new(input.to_vec())).read_value()
    }

    /// Hands out one byte per read call to exercise buffer refills.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let len = buf.len().min(1);
            self.0.read(&mut buf[..len])
        }
    }

    #[test]
    fn parses_simple_string() {
        let resp = read_one(b"+OK\r\n").unwrap();
        assert_eq!(resp, Some(RespValue::SimpleString(Bytes::from_static(b"OK"))));
    }

    #[test]
    fn parses_bulk_string() {
        let resp = read_one(b"$5\r\nhello\r\n").unwrap();
        assert_eq!(resp, Some(RespValue::bulk("hello")));
    }

    #[test]
    fn parses_null_and_empty_bulk_string() {
        assert_eq!(read_one(b"$-1\r\n").unwrap(), Some(RespValue::BulkString(None)));
        assert_eq!(read_one(b"$0\r\n\r\n").unwrap(), Some(RespValue::bulk("")));
    }

    #[test]
    fn parses_binary_bulk_with_crlf_inside() {
        let resp = read_one(b"$4\r\n\r\n\r\n\r\n").unwrap();
        assert_eq!(resp, Some(RespValue::bulk(&b"\r\n\r\n"[..])));
    }

    #[test]
    fn parses_integer() {
        let resp = read_one(b":42\r\n").unwrap().unwrap();
        assert_eq!(resp.as_integer(), Some(42));
    }

    #[test]
    fn parses_error() {
        let resp = read_one(b"-ERR bad\r\n").unwrap();
        assert_eq!(resp, Some(RespValue::Error(Bytes::from_static(b"ERR bad"))));
    }

    #[test]
    fn parses_null_and_empty_array() {
        assert_eq!(read_one(b"*-1\r\n").unwrap(), Some(RespValue::Array(None)));
        assert_eq!(read_one(b"*0\r\n").unwrap(), Some(RespValue::array(Vec::new())));
    }

    #[test]
    fn parses_nested_push() {
        let resp = read_one(b"*3\r\n$7\r\nmessage\r\n$6\r\nconfig\r\n$3\r\nkey\r\n")
            .unwrap()
            .unwrap();
        assert!(resp.is_push("message", 3));
        assert_eq!(resp.as_array().unwrap()[2], RespValue::bulk("key"));
    }

    #[test]
    fn clean_end_of_stream_is_none() {
        assert!(read_one(b"").unwrap().is_none());
    }

    #[test]
    fn reads_consecutive_values_without_overreading() {
        let mut reader = RespReader::new(Cursor::new(b"+PONG\r\n:1\r\n".to_vec()));
        assert!(matches!(reader.read_value().unwrap(), Some(RespValue::SimpleString(_))));
        assert_eq!(reader.read_value().unwrap().unwrap().as_integer(), Some(1));
        assert!(reader.read_value().unwrap().is_none());
    }

    #[test]
    fn handles_single_byte_reads() {
        let input = b"*2\r\n$4\r\npong\r\n$0\r\n\r\n".to_vec();
        let mut reader = RespReader::new(Trickle(Cursor::new(input)));
        let resp = reader.read_value().unwrap().unwrap();
        assert!(resp.is_push("pong", 2));
    }

    #[test]
    fn truncated_line_is_incomplete() {
        assert!(matches!(read_one(b"+OK"), Err(RespError::Incomplete)));
        assert!(matches!(read_one(b"+OK\r"), Err(RespError::Incomplete)));
    }

    #[test]
    fn truncated_bulk_is_incomplete() {
        assert!(matches!(read_one(b"$5\r\nhel"), Err(RespError::Incomplete)));
    }

    #[test]
    fn truncated_array_fails_whole_read() {
        let result = read_one(b"*3\r\n$7\r\nmessage\r\n$6\r\nconfig\r\n");
        assert!(matches!(result, Err(RespError::Incomplete)));
    }

    #[test]
    fn rejects_unknown_first_byte() {
        assert!(matches!(read_one(b"?what\r\n"), Err(RespError::UnknownType(b'?'))));
    }

    #[test]
    fn rejects_bare_cr() {
        assert!(matches!(read_one(b"+OK\rX\n"), Err(RespError::InvalidLineEnding(b'X'))));
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(matches!(read_one(b"$abc\r\n"), Err(RespError::InvalidLength(_))));
        assert!(matches!(read_one(b"*-2\r\n"), Err(RespError::InvalidLength(_))));
        assert!(matches!(read_one(b"$\r\n"), Err(RespError::InvalidLength(_))));
    }

    #[test]
    fn rejects_bad_integer() {
        assert!(matches!(read_one(b":12a\r\n"), Err(RespError::InvalidInteger(_))));
    }

    #[test]
    fn rejects_missing_bulk_terminator() {
        assert!(matches!(read_one(b"$2\r\nokXY"), Err(RespError::InvalidLineEnding(b'X'))));
    }

    #[test]
    fn rejects_arrays_nested_too_deep() {
        // Far deeper than the stack could take if the decoder recursed freely.
        let input = b"*1\r\n".repeat(200_000);
        assert!(matches!(read_one(&input), Err(RespError::TooDeep(MAX_NESTING))));
    }

    #[test]
    fn accepts_nesting_at_the_limit() {
        let mut input = b"*1\r\n".repeat(MAX_NESTING);
        input.extend_from_slice(b":7\r\n");
        let mut value = read_one(&input).unwrap().unwrap();
        for _ in 0..MAX_NESTING {
            value = value.as_array().unwrap()[0].clone();
        }
        assert_eq!(value.as_integer(), Some(7));
    }
}
