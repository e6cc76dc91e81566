//! Session configuration structures
//!
//! Every section has a `Default` that is valid on its own, so a config file
//! only needs to name the values it overrides.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT_SECS, DEFAULT_MAX_REFRESH_FAILURES,
    DEFAULT_PROACTIVE_HORIZON_SECS, DEFAULT_PROACTIVE_INTERVAL_SECS, DEFAULT_REFRESH_WAIT_MS,
    DEFAULT_STORAGE_NAMESPACE,
};
use crate::errors::{DomainError, Result};

/// Top-level client session configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub api: ApiConfig,
    pub renewal: RenewalConfig,
    pub storage: StorageConfig,
}

impl SessionConfig {
    /// Reject configurations that would disable renewal or the API
    ///
    /// # Errors
    /// Returns `DomainError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.api.validate()?;
        self.renewal.validate()?;
        self.storage.validate()
    }
}

/// Backend API connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl ApiConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(DomainError::Config("api.base_url must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(DomainError::Config("api.timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_API_BASE_URL.to_string(), timeout_secs: DEFAULT_API_TIMEOUT_SECS }
    }
}

/// Token renewal tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenewalConfig {
    /// Consecutive refresh failures before the session is force-cleared
    pub max_failures: u32,
    /// How long a request waits for another request's refresh
    pub wait_ceiling_ms: u64,
    /// Proactive check period
    pub proactive_interval_secs: u64,
    /// Proactive renewal fires when less than this remains
    pub proactive_horizon_secs: u64,
}

impl RenewalConfig {
    #[must_use]
    pub fn wait_ceiling(&self) -> Duration {
        Duration::from_millis(self.wait_ceiling_ms)
    }

    #[must_use]
    pub fn proactive_interval(&self) -> Duration {
        Duration::from_secs(self.proactive_interval_secs)
    }

    fn validate(&self) -> Result<()> {
        let zero_field = [
            ("renewal.max_failures", u64::from(self.max_failures)),
            ("renewal.wait_ceiling_ms", self.wait_ceiling_ms),
            ("renewal.proactive_interval_secs", self.proactive_interval_secs),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        match zero_field {
            Some((name, _)) => Err(DomainError::Config(format!("{name} must be positive"))),
            None => Ok(()),
        }
    }
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_MAX_REFRESH_FAILURES,
            wait_ceiling_ms: DEFAULT_REFRESH_WAIT_MS,
            proactive_interval_secs: DEFAULT_PROACTIVE_INTERVAL_SECS,
            proactive_horizon_secs: DEFAULT_PROACTIVE_HORIZON_SECS,
        }
    }
}

/// Where credentials are persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Platform keychain
    #[default]
    Keychain,
    /// JSON document on disk
    File,
    /// Process memory only; nothing survives a restart
    Memory,
}

impl FromStr for StorageBackend {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keychain" => Ok(Self::Keychain),
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(DomainError::Config(format!("Unknown storage backend: {other}"))),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Keychain => "keychain",
            Self::File => "file",
            Self::Memory => "memory",
        })
    }
}

/// Credential storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Keychain service / file namespace
    pub namespace: String,
    /// Document path for the `file` backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(DomainError::Config("storage.namespace must not be empty".into()));
        }
        if self.backend == StorageBackend::File && self.path.is_none() {
            return Err(DomainError::Config("storage.path is required for the file backend".into()));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            namespace: DEFAULT_STORAGE_NAMESPACE.to_string(),
            path: None,
        }
    }
}
