//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`AvisoSettings::default()`]
//! 2. If `~/.aviso/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{AvisoSettings, LogFormat};

/// Resolve the path to the settings file (`~/.aviso/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".aviso").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<AvisoSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON or the merged result fails validation, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<AvisoSettings> {
    let defaults = serde_json::to_value(AvisoSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: AvisoSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `AVISO_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut AvisoSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides using an arbitrary variable lookup.
///
/// Invalid values are logged and ignored (fall back to file/default).
pub fn apply_overrides_from<F>(settings: &mut AvisoSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_string(&lookup, "AVISO_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_u64(&lookup, "AVISO_PORT", 1, 65_535) {
        settings.server.port = u16::try_from(v).unwrap_or(settings.server.port);
    }
    if let Some(v) = read_u64(&lookup, "AVISO_MAX_MESSAGE_BYTES", 1, 1_073_741_824) {
        settings.server.max_message_bytes =
            usize::try_from(v).unwrap_or(settings.server.max_message_bytes);
    }
    if let Some(v) = read_u64(&lookup, "AVISO_SEND_TIMEOUT_MS", 1, 600_000) {
        settings.server.send_timeout_ms = v;
    }

    // ── Notifications ───────────────────────────────────────────────
    if let Some(v) = read_u64(&lookup, "AVISO_NOTIFY_INTERVAL_SECS", 1, 86_400) {
        settings.notifications.interval_secs = v;
    }
    if let Some(v) = read_string(&lookup, "AVISO_NOTIFY_MESSAGE") {
        settings.notifications.message = v;
    }
    if let Some(val) = lookup("AVISO_NOTIFY_ENABLED") {
        match parse_bool(&val) {
            Some(v) => settings.notifications.enabled = v,
            None => tracing::warn!(key = "AVISO_NOTIFY_ENABLED", value = %val, "invalid boolean env var, ignoring"),
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_string(&lookup, "AVISO_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(val) = lookup("AVISO_LOG_FORMAT") {
        match parse_log_format(&val) {
            Some(v) => settings.logging.format = v,
            None => tracing::warn!(key = "AVISO_LOG_FORMAT", value = %val, "invalid log format, ignoring"),
        }
    }
}

fn read_string<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.is_empty())
}

fn read_u64<F>(lookup: &F, name: &str, min: u64, max: u64) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let val = lookup(name)?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid integer env var, ignoring");
    }
    result
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a log format name (`text` or `json`).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_lowercase().as_str() {
        "text" | "pretty" => Some(LogFormat::Text),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}
