//! # nesplay-settings
//!
//! Layered configuration for the nesplay relay.
//!
//! Settings are resolved from three layers (in priority order):
//! 1. **Compiled defaults**: [`NesplaySettings::default()`]
//! 2. **User file**: `~/.nesplay/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `NESPLAY_*` overrides
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = NesplaySettings::default();
        let path = settings_path();
        assert!(path.ends_with(".nesplay/settings.json"));
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = NesplaySettings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.server.max_connections, 64);
        assert!(settings.server.heartbeat_interval_secs < settings.server.heartbeat_timeout_secs);
        assert_eq!(settings.logging.level, "info");
        assert!(!settings.logging.json);
    }
}
