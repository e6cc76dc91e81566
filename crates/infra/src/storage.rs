//! Credential store selection

use std::sync::Arc;

use relaycrm_common::{
    CredentialStore, FileCredentialStore, KeychainCredentialStore, MemoryCredentialStore,
};
use relaycrm_domain::{DomainError, StorageBackend, StorageConfig};
use tracing::debug;

/// Build the credential store named by `config`
///
/// # Errors
///
/// Returns `DomainError::Config` when the file backend has no path.
pub fn build_store(config: &StorageConfig) -> Result<Arc<dyn CredentialStore>, DomainError> {
    debug!(backend = %config.backend, namespace = %config.namespace, "building credential store");

    let store: Arc<dyn CredentialStore> = match config.backend {
        StorageBackend::Keychain => Arc::new(KeychainCredentialStore::new(&config.namespace)),
        StorageBackend::File => {
            let path = config.path.as_ref().ok_or_else(|| {
                DomainError::Config("storage.path is required for the file backend".into())
            })?;
            Arc::new(FileCredentialStore::with_namespace(path, &config.namespace))
        }
        StorageBackend::Memory => Arc::new(MemoryCredentialStore::new()),
    };
    Ok(store)
}
