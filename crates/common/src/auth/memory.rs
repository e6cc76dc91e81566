//! In-process credential store
//!
//! Backs the `memory` storage backend, where nothing survives a restart, and
//! doubles as the store used throughout the test suites.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::store::{CredentialStore, StoreError};
use super::types::CredentialSlot;

/// In-memory credential store
///
/// Clones share the same slots. In test builds `set_fail_removals` and
/// `set_fail_writes` make the corresponding operations fail so best-effort
/// paths can be exercised.
///
/// # Examples
///
/// ```
/// # tokio_test::block_on(async {
/// use relaycrm_common::auth::store::CredentialStore;
/// use relaycrm_common::auth::memory::MemoryCredentialStore;
/// use relaycrm_common::CredentialSlot;
///
/// let store = MemoryCredentialStore::new();
/// store.set(CredentialSlot::AccessToken, "abc").await.unwrap();
/// assert_eq!(store.get(CredentialSlot::AccessToken).await.unwrap().as_deref(), Some("abc"));
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slots: Arc<Mutex<HashMap<CredentialSlot, String>>>,
    fail_removals: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `slots`
    pub fn with_slots<'a>(slots: impl IntoIterator<Item = (CredentialSlot, &'a str)>) -> Self {
        let store = Self::new();
        {
            let mut map = store.slots.lock();
            for (slot, value) in slots {
                map.insert(slot, value.to_string());
            }
        }
        store
    }

    /// Make every `remove` fail (and leave the slot in place)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn set_fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, Ordering::SeqCst);
    }

    /// Make every `set` fail
    #[cfg(any(test, feature = "test-utils"))]
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Synchronous peek at a slot
    #[must_use]
    pub fn peek(&self, slot: CredentialSlot) -> Option<String> {
        self.slots.lock().get(&slot).cloned()
    }

    /// Whether every slot is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Number of successful writes so far
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, slot: CredentialSlot) -> Result<Option<String>, StoreError> {
        Ok(self.peek(slot))
    }

    async fn set(&self, slot: CredentialSlot, value: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::slot("write", slot, "injected write failure"));
        }
        self.slots.lock().insert(slot, value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, slot: CredentialSlot) -> Result<(), StoreError> {
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(StoreError::slot("remove", slot, "injected removal failure"));
        }
        self.slots.lock().remove(&slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `MemoryCredentialStore::set_fail_removals` with `clear_all`.
    ///
    /// Assertions:
    /// - Confirms `clear_all` reports the injected failure.
    /// - Confirms the slots survive the failed clear.
    #[tokio::test]
    async fn failing_removals_surface_from_clear_all() {
        let store = MemoryCredentialStore::with_slots([
            (CredentialSlot::AccessToken, "a"),
            (CredentialSlot::RefreshToken, "r"),
        ]);
        store.set_fail_removals(true);

        let err = store.clear_all().await.unwrap_err();
        assert!(err.to_string().contains("access_token"));
        assert_eq!(store.peek(CredentialSlot::RefreshToken).as_deref(), Some("r"));

        store.set_fail_removals(false);
        store.clear_all().await.unwrap();
        assert!(store.is_empty());
    }

    /// Validates clone sharing.
    ///
    /// Assertions:
    /// - Confirms a write through one clone is visible through another.
    #[tokio::test]
    async fn clones_share_slots() {
        let store = MemoryCredentialStore::new();
        let other = store.clone();

        store.set(CredentialSlot::UserProfile, "{}").await.unwrap();
        assert_eq!(other.peek(CredentialSlot::UserProfile).as_deref(), Some("{}"));
        assert_eq!(other.write_count(), 1);
    }
}
