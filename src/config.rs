//! Compiler configuration parsed from environment variables.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::ErrorCode;

pub const DEFAULT_CDN_ORIGIN: &str = "https://esm.sh";
pub const DEFAULT_REACT_VERSION: &str = "18.2.0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        "E_CONFIG_INVALID"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Trusted CDN origin, without a trailing slash.
    pub cdn_origin: String,
    pub react_version: String,
    /// `None` keeps every fetched module for the life of the compiler.
    pub module_cache_capacity: Option<usize>,
    /// `None` lets a hung request hang the build.
    pub fetch_timeout: Option<Duration>,
    /// Run per-module transforms on the blocking worker pool.
    pub toolchain_worker: bool,
    /// Expected SHA-256 (lowercase hex) per dependency URL.
    pub pinned_integrity: HashMap<String, String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            cdn_origin: DEFAULT_CDN_ORIGIN.to_string(),
            react_version: DEFAULT_REACT_VERSION.to_string(),
            module_cache_capacity: None,
            fetch_timeout: None,
            toolchain_worker: true,
            pinned_integrity: HashMap::new(),
        }
    }
}

impl CompilerConfig {
    /// Build typed compiler config from environment variables.
    ///
    /// Optional:
    /// - `ARTIFACT_CDN_ORIGIN`: default `https://esm.sh`
    /// - `ARTIFACT_REACT_VERSION`: default `18.2.0`
    /// - `ARTIFACT_MODULE_CACHE_CAPACITY`: `0` or absent means unbounded
    /// - `ARTIFACT_FETCH_TIMEOUT_SECS`: absent means no timeout
    /// - `ARTIFACT_TOOLCHAIN_WORKER`: `true` (default) or `false`
    /// - `ARTIFACT_PIN_INTEGRITY`: comma-separated `url=sha256hex` pairs
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cdn_origin = parse_origin(std::env::var("ARTIFACT_CDN_ORIGIN").ok().as_deref())?;
        let react_version = std::env::var("ARTIFACT_REACT_VERSION")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_REACT_VERSION.to_string());

        let module_cache_capacity = match env_parse_u64("ARTIFACT_MODULE_CACHE_CAPACITY")? {
            None | Some(0) => None,
            Some(n) => Some(usize::try_from(n).unwrap_or(usize::MAX)),
        };
        let fetch_timeout = env_parse_u64("ARTIFACT_FETCH_TIMEOUT_SECS")?.map(Duration::from_secs);
        let toolchain_worker = parse_bool(std::env::var("ARTIFACT_TOOLCHAIN_WORKER").ok().as_deref())?;
        let pinned_integrity = parse_integrity(std::env::var("ARTIFACT_PIN_INTEGRITY").ok().as_deref())?;

        Ok(Self { cdn_origin, react_version, module_cache_capacity, fetch_timeout, toolchain_worker, pinned_integrity })
    }
}

fn env_parse_u64(key: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid { var: key, reason: e.to_string() }),
        Err(_) => Ok(None),
    }
}

fn parse_origin(raw: Option<&str>) -> Result<String, ConfigError> {
    let origin = raw.unwrap_or(DEFAULT_CDN_ORIGIN).trim().trim_end_matches('/');
    let parsed = url::Url::parse(origin)
        .map_err(|e| ConfigError::Invalid { var: "ARTIFACT_CDN_ORIGIN", reason: e.to_string() })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            var: "ARTIFACT_CDN_ORIGIN",
            reason: format!("unsupported scheme '{}' (expected http or https)", parsed.scheme()),
        });
    }
    Ok(origin.to_string())
}

fn parse_bool(raw: Option<&str>) -> Result<bool, ConfigError> {
    match raw.map(str::trim) {
        None | Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            var: "ARTIFACT_TOOLCHAIN_WORKER",
            reason: format!("expected 'true' or 'false', got '{other}'"),
        }),
    }
}

fn parse_integrity(raw: Option<&str>) -> Result<HashMap<String, String>, ConfigError> {
    let mut pins = HashMap::new();
    let Some(raw) = raw else {
        return Ok(pins);
    };
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((url, digest)) = pair.rsplit_once('=') else {
            return Err(ConfigError::Invalid { var: "ARTIFACT_PIN_INTEGRITY", reason: format!("missing '=' in '{pair}'") });
        };
        let digest = digest.trim().to_ascii_lowercase();
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::Invalid {
                var: "ARTIFACT_PIN_INTEGRITY",
                reason: format!("'{digest}' is not a sha256 hex digest"),
            });
        }
        pins.insert(url.trim().to_string(), digest);
    }
    Ok(pins)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
