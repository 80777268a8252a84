//! # aviso-settings
//!
//! Layered configuration for the aviso notification server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`AvisoSettings::default()`]
//! 2. **User file**: `~/.aviso/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `AVISO_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = AvisoSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = AvisoSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.notifications.interval_secs, 10);
        assert!(settings.notifications.enabled);
        assert_eq!(settings.logging.level, "info");
    }
}
