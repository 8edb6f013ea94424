use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;

/// RESP2 value, as read from or written to the wire.
///
/// Immutable once built. Only `BulkString` and `Array` carry a null form;
/// a null array (`*-1`) is distinct from an empty one (`*0`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// +OK or +PONG style responses.
    SimpleString(Bytes),
    /// -ERR ... responses.
    Error(Bytes),
    /// :123 responses, kept as the decimal text received.
    Integer(Bytes),
    /// $... bulk strings, with None for null.
    BulkString(Option<Bytes>),
    /// *... arrays, with None for null.
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Builds a non-null bulk string.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    /// Builds an integer from a native value.
    pub fn integer(value: i64) -> Self {
        RespValue::Integer(Bytes::from(value.to_string()))
    }

    /// Builds a non-null array.
    pub fn array(items: Vec<RespValue>) -> Self {
        RespValue::Array(Some(items))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// True for the null bulk string and the null array.
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::BulkString(None) | RespValue::Array(None))
    }

    /// Raw payload of a scalar value. `None` for arrays and null bulk strings.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RespValue::SimpleString(data)
            | RespValue::Error(data)
            | RespValue::Integer(data)
            | RespValue::BulkString(Some(data)) => Some(data),
            RespValue::BulkString(None) | RespValue::Array(_) => None,
        }
    }

    /// Payload decoded as UTF-8 (lossy).
    pub fn text(&self) -> Option<Cow<'_, str>> {
        self.as_bytes().map(|data| String::from_utf8_lossy(data))
    }

    /// Parses an `Integer` payload. `None` for other variants or bad digits.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(data) => std::str::from_utf8(data).ok()?.parse().ok(),
            _ => None,
        }
    }

    /// Elements of a non-null array.
    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(Some(items)) => Some(items),
            _ => None,
        }
    }

    /// True when this is an array of `len` elements whose first element reads
    /// as `kind`, compared case-insensitively (`message`, `subscribe`, `pong`).
    pub fn is_push(&self, kind: &str, len: usize) -> bool {
        match self.as_array() {
            Some(items) if items.len() == len => items
                .first()
                .and_then(RespValue::as_bytes)
                .map(|head| head.eq_ignore_ascii_case(kind.as_bytes()))
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(data) => write!(f, "+{}", String::from_utf8_lossy(data)),
            RespValue::Error(data) => write!(f, "-{}", String::from_utf8_lossy(data)),
            RespValue::Integer(data) => write!(f, ":{}", String::from_utf8_lossy(data)),
            RespValue::BulkString(None) | RespValue::Array(None) => f.write_str("(nil)"),
            RespValue::BulkString(Some(data)) => {
                if data.len() <= 64 {
                    write!(f, "{:?}", String::from_utf8_lossy(data))
                } else {
                    write!(f, "<{}B>", data.len())
                }
            }
            RespValue::Array(Some(items)) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}
