//! # Client Configuration
//!
//! Plain config structs with `Default` impls, loadable from JSON. Durations
//! are written as integer milliseconds (`timeout_ms`, `ping_period_ms`, ...).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Longest key accepted, in UTF-8 bytes.
pub const MAX_KEY_LENGTH: usize = 250;

/// Connect + read timeout for one-shot operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between heartbeat PINGs on the subscription socket.
pub const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(30);

/// Wait between failed reconnect attempts.
pub const DEFAULT_RESCUE_DELAY: Duration = Duration::from_secs(5);

const DEFAULT_HOST: &str = "127.0.0.1:6379";

/// A `hostname:port` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAddr {
    hostname: String,
    port: u16,
}

impl HostAddr {
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for HostAddr {
    type Err = ClientError;

    fn from_str(host: &str) -> ClientResult<Self> {
        let invalid = || {
            ClientError::invalid(format!(
                "invalid host `{}`, expected `hostname:port` (e.g. `localhost:6379`)",
                host
            ))
        };
        let (hostname, port) = host.split_once(':').ok_or_else(invalid)?;
        if hostname.is_empty() || port.contains(':') {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(HostAddr {
            hostname: hostname.to_string(),
            port,
        })
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

/// Checks a key against [`MAX_KEY_LENGTH`] and returns its bytes.
pub fn validate_key(key: &str) -> ClientResult<&[u8]> {
    let bytes = key.as_bytes();
    if bytes.len() > MAX_KEY_LENGTH {
        return Err(ClientError::invalid(format!(
            "key is {} bytes, limit is {}",
            bytes.len(),
            MAX_KEY_LENGTH
        )));
    }
    Ok(bytes)
}

pub(crate) fn validate_channel(channel: &str) -> ClientResult<()> {
    if channel.is_empty() {
        return Err(ClientError::invalid("channel must not be empty"));
    }
    Ok(())
}

pub(crate) fn validate_timeout(timeout: Duration) -> ClientResult<()> {
    if timeout.is_zero() {
        return Err(ClientError::invalid("timeout must be positive"));
    }
    Ok(())
}

/// Configuration for [`OneShotClient`](crate::OneShotClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneShotConfig {
    /// Server address, e.g. "127.0.0.1:6379".
    pub host: String,
    /// Applies to connect and to every read/write.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
}

impl Default for OneShotConfig {
    fn default() -> Self {
        OneShotConfig {
            host: DEFAULT_HOST.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Identity and tuning of one subscription connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribeConfig {
    /// Server address, e.g. "127.0.0.1:6379".
    pub host: String,
    /// Channel to SUBSCRIBE to. Must not be empty.
    pub channel: String,
    /// Heartbeat interval. Zero disables the heartbeat.
    #[serde(rename = "ping_period_ms", with = "millis")]
    pub ping_period: Duration,
    /// Bound on the initial connect. The subscription socket has no read timeout.
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,
}

impl Default for SubscribeConfig {
    fn default() -> Self {
        SubscribeConfig {
            host: DEFAULT_HOST.to_string(),
            channel: String::new(),
            ping_period: DEFAULT_PING_PERIOD,
            connect_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Configuration for [`ConfigClient`](crate::ConfigClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Subscription identity, reused by every reconnect.
    #[serde(flatten)]
    pub subscribe: SubscribeConfig,
    /// Timeout for `get` calls.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
    /// Wait between failed reconnect attempts.
    #[serde(rename = "rescue_delay_ms", with = "millis")]
    pub rescue_delay: Duration,
}

impl ClientConfig {
    /// Config for `channel` on `host`, defaults elsewhere.
    pub fn new(host: impl Into<String>, channel: impl Into<String>) -> Self {
        ClientConfig {
            subscribe: SubscribeConfig {
                host: host.into(),
                channel: channel.into(),
                ..SubscribeConfig::default()
            },
            ..ClientConfig::default()
        }
    }

    /// Settings for the one-shot reads made on behalf of this client.
    pub fn one_shot(&self) -> OneShotConfig {
        OneShotConfig {
            host: self.subscribe.host.clone(),
            timeout: self.timeout,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            subscribe: SubscribeConfig::default(),
            timeout: DEFAULT_TIMEOUT,
            rescue_delay: DEFAULT_RESCUE_DELAY,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
