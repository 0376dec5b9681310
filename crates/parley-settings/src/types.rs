//! Settings types. All structs deserialize from camelCase JSON and fill
//! missing fields from their defaults.

use parley_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParleySettings {
    /// Network and socket settings.
    pub server: ServerSettings,
    /// Chat policy settings.
    pub chat: ChatSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl ParleySettings {
    /// Reject values that would make the server unusable.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxConnections must be at least 1".into(),
            ));
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if self.server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalSecs must be at least 1".into(),
            ));
        }
        if self.server.heartbeat_timeout_secs < self.server.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatTimeoutSecs must not be shorter than the interval".into(),
            ));
        }
        if self.chat.max_nickname_len == 0 || self.chat.max_message_len == 0 {
            return Err(SettingsError::InvalidValue(
                "chat length limits must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Listener and per-socket settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Upgrades beyond this many live sockets are refused.
    pub max_connections: usize,
    /// Outbound frames buffered per socket before deliveries start failing.
    pub send_queue_capacity: usize,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a pong before the socket is closed.
    pub heartbeat_timeout_secs: u64,
    /// Largest accepted inbound frame in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            max_connections: 256,
            send_queue_capacity: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024,
        }
    }
}

/// Nickname and message policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    /// Refuse a nickname already held by another connection.
    pub unique_nicknames: bool,
    /// Longest accepted nickname, in characters, after trimming.
    pub max_nickname_len: usize,
    /// Longest accepted message, in characters.
    pub max_message_len: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            unique_nicknames: false,
            max_nickname_len: 32,
            max_message_len: 2000,
        }
    }
}

/// Logging output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Compact,
        }
    }
}
