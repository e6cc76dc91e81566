//! Durable credential storage
//!
//! [`CredentialStore`] abstracts the three credential slots so the session
//! layer does not care whether secrets live in the platform keychain, a JSON
//! file, or memory. Every backend scopes its keys under an application
//! namespace (default `relaycrm.session`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::types::CredentialSlot;

/// Default namespace for persisted credentials
pub const DEFAULT_NAMESPACE: &str = "relaycrm.session";

/// Errors raised by credential storage backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend refused or failed an operation on one slot
    #[error("failed to {operation} {slot}: {message}")]
    Slot { operation: &'static str, slot: CredentialSlot, message: String },

    /// Credential file could not be read or written
    #[error("credential file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Credential file is not a valid document
    #[error("credential file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl StoreError {
    /// Error for a failed operation on one slot
    pub fn slot(
        operation: &'static str,
        slot: CredentialSlot,
        message: impl Into<String>,
    ) -> Self {
        Self::Slot { operation, slot, message: message.into() }
    }
}

/// Key/value storage for the session's credential slots
///
/// `get` returns `Ok(None)` for a slot that was never written or has been
/// removed. `remove` is idempotent.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a slot
    async fn get(&self, slot: CredentialSlot) -> Result<Option<String>, StoreError>;

    /// Write a slot, replacing any previous value
    async fn set(&self, slot: CredentialSlot, value: &str) -> Result<(), StoreError>;

    /// Remove a slot
    async fn remove(&self, slot: CredentialSlot) -> Result<(), StoreError>;

    /// Remove every slot
    ///
    /// All removals are attempted even when an earlier one fails; the first
    /// error is returned.
    async fn clear_all(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        for slot in CredentialSlot::ALL {
            if let Err(err) = self.remove(slot).await {
                warn!(slot = %slot, error = %err, "Failed to remove credential slot");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

type Document = BTreeMap<String, BTreeMap<String, String>>;

/// Credential store backed by a JSON document on disk
///
/// The document maps namespace to slot key to value, so several namespaces
/// can share one file. Writes go to a unique temporary file that is then
/// renamed over the target.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    namespace: String,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Store at `path` under [`DEFAULT_NAMESPACE`]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_namespace(path, DEFAULT_NAMESPACE)
    }

    /// Store at `path` under `namespace`
    pub fn with_namespace(path: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self { path: path.into(), namespace: namespace.into(), write_lock: Mutex::new(()) }
    }

    /// Path of the backing document
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Document, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Document::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Document::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, document: &Document) -> Result<(), StoreError> {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(document)?;
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "credentials".to_string());
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_path =
            self.path.with_file_name(format!("{file_name}.{}.{seq}.tmp", std::process::id()));

        tokio::fs::write(&tmp_path, json).await?;
        restrict_permissions(&tmp_path).await?;
        if let Err(err) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn update<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let namespace = document.entry(self.namespace.clone()).or_default();
        if !mutate(namespace) {
            return Ok(());
        }
        if namespace.is_empty() {
            document.remove(&self.namespace);
        }
        self.save(&document).await
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, slot: CredentialSlot) -> Result<Option<String>, StoreError> {
        let document = self.load().await?;
        Ok(document.get(&self.namespace).and_then(|slots| slots.get(slot.key()).cloned()))
    }

    async fn set(&self, slot: CredentialSlot, value: &str) -> Result<(), StoreError> {
        debug!(slot = %slot, path = %self.path.display(), "Writing credential slot");
        let value = value.to_string();
        self.update(move |slots| {
            slots.insert(slot.key().to_string(), value);
            true
        })
        .await
    }

    async fn remove(&self, slot: CredentialSlot) -> Result<(), StoreError> {
        debug!(slot = %slot, path = %self.path.display(), "Removing credential slot");
        self.update(move |slots| slots.remove(slot.key()).is_some()).await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        debug!(path = %self.path.display(), "Clearing credential namespace");
        self.update(|slots| {
            let had_entries = !slots.is_empty();
            slots.clear();
            had_entries
        })
        .await
    }
}
