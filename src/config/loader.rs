//! Configuration loader for `<config_dir>/code-sandbox/config.json`.
//!
//! The persisted file is deep-merged over the built-in defaults: nested
//! objects merge key by key, any other value replaces the leaf it names.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::schema::SandboxConfig;
use crate::error::{ConfigError, SandboxError};

/// Default settings file name.
const DEFAULT_SETTINGS_FILE: &str = "config.json";

/// Get the default settings file path.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("code-sandbox").join(DEFAULT_SETTINGS_FILE))
}

/// Load configuration from a file path.
pub fn load_config(path: &Path) -> Result<SandboxConfig, SandboxError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()).into());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::ParseError(format!("Failed to read config file: {}", e))
    })?;

    parse_config(&content)
}

/// Parse configuration from a JSON string, merged over the defaults.
pub fn parse_config(json: &str) -> Result<SandboxConfig, SandboxError> {
    let overrides: Value = serde_json::from_str(json).map_err(|e| {
        ConfigError::ParseError(format!("Failed to parse config JSON: {}", e))
    })?;

    if !overrides.is_object() && !overrides.is_null() {
        return Err(ConfigError::ParseError("config root must be a JSON object".to_string()).into());
    }

    let mut merged = serde_json::to_value(SandboxConfig::default())
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;
    deep_merge(&mut merged, overrides);

    let config: SandboxConfig = serde_json::from_value(merged).map_err(|e| {
        ConfigError::ParseError(format!("Invalid config value: {}", e))
    })?;

    config.validate()?;

    Ok(config)
}

/// Load configuration, falling back to the defaults on any problem.
///
/// A missing file is created from the defaults. A malformed file is
/// reported and ignored. This never fails.
pub fn load_or_init(path: Option<&Path>) -> SandboxConfig {
    let path = match path.map(Path::to_path_buf).or_else(default_settings_path) {
        Some(path) => path,
        None => {
            tracing::warn!("No configuration directory available, using built-in defaults");
            return SandboxConfig::default();
        }
    };

    if !path.exists() {
        let defaults = SandboxConfig::default();
        if let Err(e) = write_defaults(&path, &defaults) {
            tracing::warn!("Could not create default config at {:?}: {}", path, e);
        } else {
            tracing::info!("Created default config at {:?}", path);
        }
        return defaults;
    }

    match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Configuration error in {:?}, using defaults: {}", path, e);
            SandboxConfig::default()
        }
    }
}

fn write_defaults(path: &Path, config: &SandboxConfig) -> Result<(), SandboxError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;
    std::fs::write(path, json + "\n")?;
    Ok(())
}

/// Merge `src` into `dst`, replacing only the leaves `src` names.
pub fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (key, value) in src_map {
                let nested = value.is_object()
                    && dst_map.get(&key).map(Value::is_object).unwrap_or(false);
                if nested {
                    if let Some(existing) = dst_map.get_mut(&key) {
                        deep_merge(existing, value);
                    }
                } else {
                    dst_map.insert(key, value);
                }
            }
        }
        (_, Value::Null) => {}
        (dst, src) => *dst = src,
    }
}
