//! Session configuration sources
//!
//! Resolution order:
//! 1. Environment, when `RELAYCRM_API_URL` is set
//! 2. The first `relaycrm.{json,toml}` / `config.{json,toml}` found
//! 3. Built-in defaults
//!
//! A source that is present but broken is an error; the loader never skips
//! past it to the next one.
//!
//! ## Variables
//! - `RELAYCRM_API_URL`: API base URL (required for env loading)
//! - `RELAYCRM_API_TIMEOUT_SECS`: Per-request timeout
//! - `RELAYCRM_MAX_REFRESH_FAILURES`: Refresh failures before forced logout
//! - `RELAYCRM_REFRESH_WAIT_MS`: How long a 401 waits for an in-flight refresh
//! - `RELAYCRM_PROACTIVE_INTERVAL_SECS`: Proactive renewal check period
//! - `RELAYCRM_PROACTIVE_HORIZON_SECS`: Renew when less than this remains
//! - `RELAYCRM_STORAGE_BACKEND`: `keychain`, `file` or `memory`
//! - `RELAYCRM_STORAGE_NAMESPACE`: Keychain service / file namespace
//! - `RELAYCRM_STORAGE_PATH`: Credential file for the `file` backend
//!
//! Files are looked up in the working directory first, then next to the
//! executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use relaycrm_domain::constants::DEFAULT_STORAGE_FILE;
use relaycrm_domain::{DomainError, Result, SessionConfig, StorageBackend};

/// Resolve configuration from environment, file, or defaults
///
/// # Errors
/// Returns `DomainError::Config` if:
/// - An environment variable or file holds an invalid value
/// - A config file exists but cannot be parsed
/// - The resulting configuration fails validation
pub fn load() -> Result<SessionConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!(source = "env", "Session configuration loaded");
            return Ok(config);
        }
        Err(e) if std::env::var_os("RELAYCRM_API_URL").is_some() => return Err(e),
        Err(e) => tracing::debug!(error = ?e, "Failed to load from environment, trying file"),
    }

    match find_config_path() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::info!("No config file found; using defaults");
            Ok(SessionConfig::default())
        }
    }
}

/// Build configuration from `RELAYCRM_*` variables
///
/// `RELAYCRM_API_URL` is required; every other variable falls back to its
/// default.
///
/// # Errors
/// Returns `DomainError::Config` if the URL is missing or a variable has an
/// invalid value.
pub fn load_from_env() -> Result<SessionConfig> {
    let mut config = SessionConfig::default();

    config.api.base_url = env_var("RELAYCRM_API_URL")?;
    if let Some(timeout) = env_parse("RELAYCRM_API_TIMEOUT_SECS")? {
        config.api.timeout_secs = timeout;
    }

    if let Some(max_failures) = env_parse("RELAYCRM_MAX_REFRESH_FAILURES")? {
        config.renewal.max_failures = max_failures;
    }
    if let Some(wait) = env_parse("RELAYCRM_REFRESH_WAIT_MS")? {
        config.renewal.wait_ceiling_ms = wait;
    }
    if let Some(interval) = env_parse("RELAYCRM_PROACTIVE_INTERVAL_SECS")? {
        config.renewal.proactive_interval_secs = interval;
    }
    if let Some(horizon) = env_parse("RELAYCRM_PROACTIVE_HORIZON_SECS")? {
        config.renewal.proactive_horizon_secs = horizon;
    }

    if let Some(backend) = env_parse::<StorageBackend>("RELAYCRM_STORAGE_BACKEND")? {
        config.storage.backend = backend;
    }
    if let Ok(namespace) = std::env::var("RELAYCRM_STORAGE_NAMESPACE") {
        config.storage.namespace = namespace;
    }
    config.storage.path = std::env::var_os("RELAYCRM_STORAGE_PATH").map(PathBuf::from);
    if config.storage.backend == StorageBackend::File && config.storage.path.is_none() {
        config.storage.path = Some(PathBuf::from(DEFAULT_STORAGE_FILE));
    }

    config.validate()?;
    Ok(config)
}

/// Read configuration from `path`, or from the first config file found
///
/// # Errors
/// Returns `DomainError::Config` when the file is missing or unreadable,
/// does not parse as JSON/TOML, or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<SessionConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(DomainError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => find_config_path().ok_or_else(|| {
            DomainError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(source = "file", path = %config_path.display(), "Reading session configuration");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| DomainError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// JSON or TOML by extension; no extension means JSON
fn parse_config(contents: &str, path: &Path) -> Result<SessionConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| DomainError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| DomainError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(DomainError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file in the standard locations
pub fn find_config_path() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["relaycrm.json", "relaycrm.toml", "config.json", "config.toml"];

    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    dirs.iter().flat_map(|dir| NAMES.iter().map(move |name| dir.join(name))).find(|p| p.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| DomainError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional environment variable
///
/// # Errors
/// Returns `DomainError::Config` if the variable is set but does not parse.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| DomainError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}
