//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the aviso server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Max reassembled WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Upper bound on a single send, in milliseconds.
    pub send_timeout_ms: u64,
    /// Periodic notification push.
    pub notifications: NotificationConfig,
}

impl ServerConfig {
    /// Send timeout as a `Duration`.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: 1024 * 1024, // 1 MiB
            send_timeout_ms: 5_000,
            notifications: NotificationConfig::default(),
        }
    }
}

/// Notification scheduler configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Whether the scheduler is started.
    pub enabled: bool,
    /// Seconds between ticks.
    pub interval_secs: u64,
    /// Text pushed on each tick.
    pub message: String,
}

impl NotificationConfig {
    /// Tick period as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            message: "This is a notification message sent every 2 minutes.".into(),
        }
    }
}
