//! Credential store backed by the platform keychain
//!
//! # Module Layering
//!
//! - **`security::keychain`**: generic secret storage via the platform
//!   keychain
//! - **`auth::keychain`** (this module): maps credential slots onto keychain
//!   entries (service = namespace, account = slot key)

use async_trait::async_trait;

use super::store::{CredentialStore, StoreError, DEFAULT_NAMESPACE};
use super::types::CredentialSlot;
use crate::security::{KeychainError, KeychainProvider};

/// [`CredentialStore`] over [`KeychainProvider`]
#[derive(Debug, Clone)]
pub struct KeychainCredentialStore {
    keychain: KeychainProvider,
}

impl KeychainCredentialStore {
    /// Store under `namespace` (used as the keychain service name)
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { keychain: KeychainProvider::new(namespace) }
    }

    /// Namespace the slots are stored under
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.keychain.service_name()
    }
}

impl Default for KeychainCredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

fn store_error(operation: &'static str, slot: CredentialSlot, err: KeychainError) -> StoreError {
    StoreError::slot(operation, slot, err.to_string())
}

#[async_trait]
impl CredentialStore for KeychainCredentialStore {
    async fn get(&self, slot: CredentialSlot) -> Result<Option<String>, StoreError> {
        match self.keychain.get_secret(slot.key()) {
            Ok(value) => Ok(Some(value)),
            Err(KeychainError::NotFound) => Ok(None),
            Err(err) => Err(store_error("read", slot, err)),
        }
    }

    async fn set(&self, slot: CredentialSlot, value: &str) -> Result<(), StoreError> {
        self.keychain.set_secret(slot.key(), value).map_err(|err| store_error("write", slot, err))
    }

    async fn remove(&self, slot: CredentialSlot) -> Result<(), StoreError> {
        self.keychain.delete_secret(slot.key()).map_err(|err| store_error("remove", slot, err))
    }
}
