//! Platform keychain access
//!
//! A thin wrapper over the platform keychain (macOS Keychain, Windows
//! Credential Manager, Linux Secret Service) for storing string secrets
//! under one service name.
//!
//! ## Usage
//!
//! ```no_run
//! use relaycrm_common::security::keychain::KeychainProvider;
//!
//! let keychain = KeychainProvider::new("RelayCRM.session");
//! keychain.set_secret("access_token", "eyJ...")?;
//! let token = keychain.get_secret("access_token")?;
//! # Ok::<(), relaycrm_common::security::KeychainError>(())
//! ```

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

/// Secret storage scoped to one keychain service
#[derive(Debug, Clone)]
pub struct KeychainProvider {
    service_name: String,
}

impl KeychainProvider {
    /// Create a provider for `service_name` (e.g. "RelayCRM.session")
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    /// Keychain service this provider reads and writes
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Store a secret value
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Storing secret in keychain");

        let entry = self.create_entry(key)?;
        entry.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {key}: {e}"))
        })
    }

    /// Retrieve a secret value
    ///
    /// # Errors
    /// Returns `KeychainError::NotFound` if the secret doesn't exist and
    /// `KeychainError::AccessFailed` if keychain access fails
    pub fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        let entry = self.create_entry(key)?;
        entry.get_password().map_err(|e| {
            if matches!(e, keyring::Error::NoEntry) {
                KeychainError::NotFound
            } else {
                KeychainError::AccessFailed(format!("Failed to retrieve secret for {key}: {e}"))
            }
        })
    }

    /// Delete a secret (idempotent)
    pub fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Deleting secret from keychain");

        let entry = self.create_entry(key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to delete secret for {key}: {e}"
            ))),
        }
    }

    /// Check if a secret exists
    #[must_use]
    pub fn secret_exists(&self, key: &str) -> bool {
        self.create_entry(key).map(|entry| entry.get_password().is_ok()).unwrap_or(false)
    }

    fn create_entry(&self, account: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, account).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to create keychain entry: {e}"))
        })
    }
}

/// Keychain error types
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Keychain access failed (permission denied, not available, etc.)
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    /// Entry not found in keychain
    #[error("Entry not found")]
    NotFound,
}
