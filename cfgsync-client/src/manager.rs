//! # Config Manager
//!
//! Publisher side: writes values and announces the changed key on the
//! channel every [`ConfigClient`](crate::ConfigClient) listens to.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{decode_value, encode_value};
use crate::config::{validate_channel, OneShotConfig};
use crate::error::ClientResult;
use crate::oneshot::OneShotClient;

/// Writes configuration values and publishes change notices.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    client: OneShotClient,
    channel: String,
}

impl ConfigManager {
    /// Manager for `channel` on `host` with the default timeout.
    pub fn new(host: &str, channel: impl Into<String>) -> ClientResult<Self> {
        Self::with_config(
            OneShotConfig {
                host: host.to_string(),
                ..OneShotConfig::default()
            },
            channel,
        )
    }

    pub fn with_config(config: OneShotConfig, channel: impl Into<String>) -> ClientResult<Self> {
        let channel = channel.into();
        validate_channel(&channel)?;
        Ok(ConfigManager {
            client: OneShotClient::with_config(config)?,
            channel,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Reads and decodes the value stored under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> ClientResult<Option<T>> {
        match self.client.get(key)? {
            Some(bytes) => decode_value(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Reads the raw bytes stored under `key`.
    pub fn get_bytes(&self, key: &str) -> ClientResult<Option<Bytes>> {
        self.client.get(key)
    }

    /// Stores `value` under `key`, then announces `key`.
    ///
    /// Returns how many subscribers received the notice.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> ClientResult<i64> {
        let encoded = encode_value(value)?;
        self.set_bytes(key, &encoded)
    }

    /// Stores raw bytes under `key`, then announces `key`.
    pub fn set_bytes(&self, key: &str, value: &[u8]) -> ClientResult<i64> {
        self.client.set(key, value)?;
        self.notify(key)
    }

    /// Announces `key` without touching its value.
    pub fn notify(&self, key: &str) -> ClientResult<i64> {
        let receivers = self.client.publish(&self.channel, key.as_bytes())?;
        tracing::info!(
            channel = %self.channel,
            key,
            receivers,
            "change published"
        );
        Ok(receivers)
    }

    /// Deletes `key` and announces it.
    ///
    /// When the key did not exist nothing is published and 0 is returned, the
    /// same as a removal no subscriber heard about.
    pub fn delete(&self, key: &str) -> ClientResult<i64> {
        if self.client.delete(key)? {
            self.notify(key)
        } else {
            tracing::debug!(channel = %self.channel, key, "delete of absent key, nothing published");
            Ok(0)
        }
    }
}
