//! Settings loading: defaults, then a JSON file deep-merged on top, then
//! environment overrides.
//!
//! Deep merge rules:
//! - Objects merge recursively (source wins per key)
//! - Arrays and primitives are replaced by the source
//! - `null` in the source keeps the target value

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::ParleySettings;

/// Default settings file location (`~/.parley/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".parley").join("settings.json")
}

/// Load settings from `path` with environment overrides.
///
/// A missing file yields defaults. An unreadable or malformed file, or a
/// merged result that fails validation, is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ParleySettings> {
    let defaults = serde_json::to_value(ParleySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ParleySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursively merge `source` over `target`.
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

/// Apply `PARLEY_*` environment variables.
pub fn apply_env_overrides(settings: &mut ParleySettings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Apply overrides read through `lookup`.
///
/// Unparseable or out-of-range values are ignored with a warning.
pub fn apply_overrides_from(
    settings: &mut ParleySettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let read = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(v) = read("PARLEY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("PARLEY_PORT") {
        match v.parse::<u16>() {
            Ok(port) => settings.server.port = port,
            Err(_) => warn!(key = "PARLEY_PORT", value = %v, "invalid port, ignoring"),
        }
    }
    if let Some(v) = read("PARLEY_MAX_CONNECTIONS") {
        match parse_usize_range(&v, 1, 100_000) {
            Some(n) => settings.server.max_connections = n,
            None => warn!(key = "PARLEY_MAX_CONNECTIONS", value = %v, "invalid count, ignoring"),
        }
    }
    if let Some(v) = read("PARLEY_HEARTBEAT_INTERVAL_SECS") {
        match parse_u64_range(&v, 1, 3600) {
            Some(n) => settings.server.heartbeat_interval_secs = n,
            None => {
                warn!(key = "PARLEY_HEARTBEAT_INTERVAL_SECS", value = %v, "invalid interval, ignoring");
            }
        }
    }
    if let Some(v) = read("PARLEY_UNIQUE_NICKNAMES") {
        match parse_bool(&v) {
            Some(b) => settings.chat.unique_nicknames = b,
            None => warn!(key = "PARLEY_UNIQUE_NICKNAMES", value = %v, "invalid boolean, ignoring"),
        }
    }
    if let Some(v) = read("PARLEY_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Parse `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, case-insensitively.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `u64` within `min..=max`.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a `usize` within `min..=max`.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}
