//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`NesplaySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `NESPLAY_*` environment overrides
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{
    HEARTBEAT_SECS_RANGE, MAX_CONNECTIONS_RANGE, MAX_MESSAGE_SIZE_RANGE, NesplaySettings,
    SEND_QUEUE_RANGE,
};

/// Resolve the path to the settings file (`~/.nesplay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".nesplay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<NesplaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. A file with invalid JSON is an error.
/// Numeric limits are clamped into range after both layers.
pub fn load_settings_from_path(path: &Path) -> Result<NesplaySettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.server.clamp_limits();
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<NesplaySettings> {
    let defaults = serde_json::to_value(NesplaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `NESPLAY_*` environment variable overrides.
///
/// Invalid or out-of-range values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut NesplaySettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup` (a stand-in for the process
/// environment).
pub fn apply_overrides_from<F>(settings: &mut NesplaySettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader(lookup);

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("NESPLAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.parsed("NESPLAY_PORT", |s| parse_in_range::<u16>(s, &(1..=65535))) {
        settings.server.port = v;
    }
    if let Some(v) = env.parsed("NESPLAY_MAX_CONNECTIONS", |s| {
        parse_in_range(s, &MAX_CONNECTIONS_RANGE)
    }) {
        settings.server.max_connections = v;
    }
    if let Some(v) = env.parsed("NESPLAY_HEARTBEAT_INTERVAL_SECS", |s| {
        parse_in_range(s, &HEARTBEAT_SECS_RANGE)
    }) {
        settings.server.heartbeat_interval_secs = v;
    }
    if let Some(v) = env.parsed("NESPLAY_HEARTBEAT_TIMEOUT_SECS", |s| {
        parse_in_range(s, &HEARTBEAT_SECS_RANGE)
    }) {
        settings.server.heartbeat_timeout_secs = v;
    }
    if let Some(v) = env.parsed("NESPLAY_MAX_MESSAGE_SIZE", |s| {
        parse_in_range(s, &MAX_MESSAGE_SIZE_RANGE)
    }) {
        settings.server.max_message_size = v;
    }
    if let Some(v) = env.parsed("NESPLAY_SEND_QUEUE", |s| parse_in_range(s, &SEND_QUEUE_RANGE)) {
        settings.server.send_queue_capacity = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("NESPLAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.parsed("NESPLAY_LOG_JSON", parse_bool) {
        settings.logging.json = v;
    }
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

/// Parse a string as a number within `range`.
pub fn parse_in_range<T>(val: &str, range: &RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    let n: T = val.parse().ok()?;
    range.contains(&n).then_some(n)
}

// ── Env readers ─────────────────────────────────────────────────────────────

struct EnvReader<F>(F);

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = (self.0)(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid env var, ignoring");
        }
        result
    }
}
