//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`VehiculoSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `VEHICULO_*` environment overrides
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{TokenPolicy, VehiculoSettings};

/// Load settings from `path` (if present) with env var overrides applied.
///
/// A missing file yields defaults. Invalid JSON or invalid values are errors.
pub fn load_settings_from_path(path: &Path) -> Result<VehiculoSettings> {
    let defaults = serde_json::to_value(VehiculoSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: VehiculoSettings = serde_json::from_value(merged)?;
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

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (the file/default value stays).
pub fn apply_env_overrides(settings: &mut VehiculoSettings) {
    if let Some(v) = read_env_string("VEHICULO_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("VEHICULO_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_u64("VEHICULO_TELEMETRY_INTERVAL", 1, 86_400) {
        settings.telemetry.interval_secs = v;
    }
    if let Some(v) = read_env_string("VEHICULO_CREDENTIALS") {
        settings.auth.credentials_path = PathBuf::from(v);
    }
    if let Some(v) = read_env_string("VEHICULO_TOKEN_POLICY") {
        match TokenPolicy::parse(&v) {
            Some(policy) => settings.auth.token_policy = policy,
            None => tracing::warn!(key = "VEHICULO_TOKEN_POLICY", value = %v, "unknown token policy, ignoring"),
        }
    }
    if let Some(v) = read_env_string("VEHICULO_LOG_FILE") {
        settings.logging.log_file = PathBuf::from(v);
    }
    if let Some(v) = read_env_string("VEHICULO_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}
