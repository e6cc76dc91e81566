//! Integration tests for credential storage backends
//!
//! Both backends are driven through `Arc<dyn CredentialStore>` to check they
//! honour the same contract.

use std::sync::Arc;

use relaycrm_common::auth::store::{CredentialStore, FileCredentialStore};
use relaycrm_common::testing::MemoryCredentialStore;
use relaycrm_common::CredentialSlot;
use tempfile::TempDir;

async fn exercise_contract(store: Arc<dyn CredentialStore>) -> anyhow::Result<()> {
    for slot in CredentialSlot::ALL {
        assert_eq!(store.get(slot).await?, None);
    }

    store.set(CredentialSlot::AccessToken, "access-1").await?;
    store.set(CredentialSlot::RefreshToken, "refresh-1").await?;
    store.set(CredentialSlot::UserProfile, r#"{"id":1}"#).await?;
    store.set(CredentialSlot::AccessToken, "access-2").await?;

    assert_eq!(store.get(CredentialSlot::AccessToken).await?.as_deref(), Some("access-2"));
    assert_eq!(store.get(CredentialSlot::RefreshToken).await?.as_deref(), Some("refresh-1"));

    store.remove(CredentialSlot::AccessToken).await?;
    store.remove(CredentialSlot::AccessToken).await?;
    assert_eq!(store.get(CredentialSlot::AccessToken).await?, None);
    assert!(store.get(CredentialSlot::UserProfile).await?.is_some());

    store.clear_all().await?;
    for slot in CredentialSlot::ALL {
        assert_eq!(store.get(slot).await?, None);
    }
    Ok(())
}

/// Validates the `CredentialStore` contract on the file backend.
///
/// Assertions:
/// - Confirms overwrite, idempotent remove and `clear_all` semantics.
#[tokio::test]
async fn file_store_honours_contract() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = Arc::new(FileCredentialStore::new(dir.path().join("nested/session.json")));
    exercise_contract(store).await
}

/// Validates the `CredentialStore` contract on the memory backend.
///
/// Assertions:
/// - Confirms overwrite, idempotent remove and `clear_all` semantics.
#[tokio::test]
async fn memory_store_honours_contract() -> anyhow::Result<()> {
    exercise_contract(Arc::new(MemoryCredentialStore::new())).await
}

/// Validates concurrent writers on one credential file.
///
/// Assertions:
/// - Confirms every concurrent write to distinct slots survives.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_file_writes_do_not_lose_slots() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = Arc::new(FileCredentialStore::new(dir.path().join("session.json")));

    let handles: Vec<_> = CredentialSlot::ALL
        .into_iter()
        .map(|slot| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.set(slot, slot.key()).await })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }

    for slot in CredentialSlot::ALL {
        assert_eq!(store.get(slot).await?.as_deref(), Some(slot.key()));
    }
    Ok(())
}

/// Validates `clear_all` under injected removal failures.
///
/// Assertions:
/// - Confirms the default `clear_all` surfaces the first failure.
#[tokio::test]
async fn clear_all_reports_failure() -> anyhow::Result<()> {
    let store = MemoryCredentialStore::with_slots([(CredentialSlot::AccessToken, "a")]);
    store.set_fail_removals(true);

    let err = store.clear_all().await.unwrap_err();
    assert!(err.to_string().contains("injected removal failure"));
    Ok(())
}
