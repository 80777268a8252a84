//! Settings types. Field names are camelCase on disk.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Default text pushed by the notification scheduler.
pub const DEFAULT_NOTIFICATION_MESSAGE: &str =
    "This is a notification message sent every 2 minutes.";

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AvisoSettings {
    /// Network and connection limits.
    pub server: ServerSettings,
    /// Periodic notification push.
    pub notifications: NotificationSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl AvisoSettings {
    /// Reject values that would make the server unusable.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_message_bytes == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxMessageBytes must be greater than zero".into(),
            ));
        }
        if self.server.send_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendTimeoutMs must be greater than zero".into(),
            ));
        }
        if self.notifications.interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "notifications.intervalSecs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Server network settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Upper bound on one reassembled message, in bytes.
    pub max_message_bytes: usize,
    /// How long a single send may take before it is abandoned.
    pub send_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_message_bytes: 1024 * 1024,
            send_timeout_ms: 5_000,
        }
    }
}

/// Notification scheduler settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    /// Whether the scheduler runs at all.
    pub enabled: bool,
    /// Seconds between ticks.
    pub interval_secs: u64,
    /// Text pushed on each tick.
    pub message: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            message: DEFAULT_NOTIFICATION_MESSAGE.to_string(),
        }
    }
}

/// Output format for log lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}
