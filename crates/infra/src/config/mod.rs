//! Host configuration loader.
//!
//! Loads process-level settings (database location, API endpoint) from
//! environment variables or a config file. This is host wiring, not the
//! persisted sync policy; that lives in the database.
//!
//! ## Loading strategy
//! 1. Attempt environment variables first
//! 2. Fall back to probing for a config file
//! 3. JSON and TOML are supported, detected by extension
//!
//! ## Environment variables
//! - `STEEPLE_DB_PATH`: database file path (required)
//! - `STEEPLE_DB_POOL_SIZE`: connection pool size (required)
//! - `STEEPLE_API_BASE_URL`: remote API base URL (optional)
//! - `STEEPLE_REQUEST_TIMEOUT_SECS`: per-request deadline (optional)
//!
//! ## File locations
//! `config.{json,toml}` and `steeple.{json,toml}` are probed in the
//! working directory, its two ancestors, and next to the executable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use steeple_domain::constants::DEFAULT_REQUEST_TIMEOUT_SECS;
use steeple_domain::{Result, SteepleError};

/// Database wiring for the host process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub path: String,
    pub pool_size: u32,
}

/// Remote API wiring for the host process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

const fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self { base_url: None, request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS }
    }
}

/// Process-level settings loaded at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    pub database: DatabaseSettings,
    #[serde(default)]
    pub api: ApiSettings,
}

/// Load settings with automatic fallback.
///
/// Environment variables win; an incomplete environment falls back to
/// probing for a config file.
///
/// # Errors
///
/// Returns `SteepleError::Config` when neither source yields a valid
/// configuration.
pub fn load() -> Result<HostSettings> {
    match load_from_env() {
        Ok(settings) => {
            tracing::info!("host settings loaded from environment");
            Ok(settings)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "environment incomplete, trying config file");
            load_from_file(None)
        }
    }
}

/// Load settings from environment variables only.
///
/// # Errors
///
/// Returns `SteepleError::Config` when a required variable is missing
/// or unparseable.
pub fn load_from_env() -> Result<HostSettings> {
    let db_path = env_var("STEEPLE_DB_PATH")?;
    let pool_size = env_var("STEEPLE_DB_POOL_SIZE").and_then(|s| {
        s.parse::<u32>().map_err(|e| SteepleError::Config(format!("invalid pool size: {e}")))
    })?;

    let base_url = std::env::var("STEEPLE_API_BASE_URL").ok();
    let request_timeout_secs = match std::env::var("STEEPLE_REQUEST_TIMEOUT_SECS") {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| SteepleError::Config(format!("invalid request timeout: {e}")))?,
        Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
    };

    Ok(HostSettings {
        database: DatabaseSettings { path: db_path, pool_size },
        api: ApiSettings { base_url, request_timeout_secs },
    })
}

/// Load settings from a file, probing standard locations when `path`
/// is `None`.
///
/// # Errors
///
/// Returns `SteepleError::Config` when no file is found or the file
/// cannot be parsed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<HostSettings> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SteepleError::Config(format!("config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SteepleError::Config("no config file found in any standard location".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading host settings from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SteepleError::Config(format!("failed to read config file: {e}")))?;

    parse_settings(&contents, &config_path)
}

fn parse_settings(contents: &str, path: &Path) -> Result<HostSettings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SteepleError::Config(format!("invalid TOML: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SteepleError::Config(format!("invalid JSON: {e}"))),
        _ => Err(SteepleError::Config(format!("unsupported config format: {extension}"))),
    }
}

/// Probe standard locations for a config file, returning the first hit.
#[must_use]
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        for base in [&cwd, &cwd.join(".."), &cwd.join("../..")] {
            candidates.extend([
                base.join("config.json"),
                base.join("config.toml"),
                base.join("steeple.json"),
                base.join("steeple.toml"),
            ]);
        }
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend([
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("steeple.json"),
                exe_dir.join("steeple.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| SteepleError::Config(format!("missing required environment variable: {key}")))
}
