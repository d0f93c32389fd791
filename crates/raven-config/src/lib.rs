#![forbid(unsafe_code)]

//! Server configuration.
//!
//! A flat, enumerated key set loaded from a properties file and overridden
//! by `RAVEN_*` environment variables; the environment always wins. Unknown
//! file keys are warned about rather than rejected so configs survive
//! version skew.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value {value:?} for config key {key}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseFormat {
    /// Compact rendering tuned for agent token budgets.
    #[default]
    TokenEfficient,
    Json,
}

impl ResponseFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "token-efficient" | "compact" => Some(ResponseFormat::TokenEfficient),
            "json" => Some(ResponseFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_seconds: u32,
    pub max_entries: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 120,
            max_entries: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub response_format: ResponseFormat,
    pub cache: CacheSettings,
    /// Off by default: scripts run with the server's privileges.
    pub script_execution_enabled: bool,
    /// Decompiler name resolved case-insensitively against the registry.
    pub decompiler: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 8085,
            response_format: ResponseFormat::default(),
            cache: CacheSettings::default(),
            script_execution_enabled: false,
            decompiler: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration: defaults, then the properties file (when given),
    /// then `RAVEN_*` environment variables on top.
    pub fn load(properties_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = properties_path {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            config.apply_properties(&parse_properties(&text))?;
        }
        config.apply_environment()?;
        Ok(config)
    }

    fn apply_properties(&mut self, entries: &HashMap<String, String>) -> Result<(), ConfigError> {
        for (key, value) in entries {
            if !self.apply_key(key, value)? {
                warn!(key, "ignoring unknown config key");
            }
        }
        Ok(())
    }

    fn apply_environment(&mut self) -> Result<(), ConfigError> {
        const KEYS: [(&str, &str); 8] = [
            ("RAVEN_BIND_HOST", "bind-host"),
            ("RAVEN_BIND_PORT", "bind-port"),
            ("RAVEN_RESPONSE_FORMAT", "response-format"),
            ("RAVEN_CACHE_ENABLED", "cache.enabled"),
            ("RAVEN_CACHE_TTL_SECONDS", "cache.ttl-seconds"),
            ("RAVEN_CACHE_MAX_ENTRIES", "cache.max-entries"),
            ("RAVEN_SCRIPT_EXECUTION_ENABLED", "script-execution.enabled"),
            ("RAVEN_DECOMPILER", "decompiler"),
        ];
        for (env_key, config_key) in KEYS {
            if let Ok(value) = std::env::var(env_key) {
                self.apply_key(config_key, &value)?;
            }
        }
        Ok(())
    }

    /// Returns false for an unknown key.
    fn apply_key(&mut self, key: &str, value: &str) -> Result<bool, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "bind-host" => self.bind_host = value.to_string(),
            "bind-port" => self.bind_port = value.parse().map_err(|_| invalid())?,
            "response-format" => {
                self.response_format = ResponseFormat::parse(value).ok_or_else(invalid)?;
            }
            "cache.enabled" => self.cache.enabled = parse_bool(value).ok_or_else(invalid)?,
            "cache.ttl-seconds" => {
                self.cache.ttl_seconds = value.parse().map_err(|_| invalid())?;
            }
            "cache.max-entries" => {
                self.cache.max_entries = value.parse().map_err(|_| invalid())?;
            }
            "script-execution.enabled" => {
                self.script_execution_enabled = parse_bool(value).ok_or_else(invalid)?;
            }
            "decompiler" => {
                self.decompiler = (!value.is_empty()).then(|| value.to_string());
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `key=value` lines; `#` and `!` comment lines, blank lines skipped.
fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            entries.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    entries
}
