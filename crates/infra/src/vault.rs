//! In-memory session mirror over a durable credential store
//!
//! [`CredentialVault`] is the single owner of the session's credentials. Reads
//! are served from an in-memory mirror; writes go to the
//! [`CredentialStore`] first and are serialized by an async lock so that a
//! renewal's generation check and its write cannot interleave with a logout.
//!
//! The session generation is bumped on every clear and every fresh login. A
//! renewal started under an older generation is discarded instead of
//! resurrecting a session that has since ended.

use std::sync::Arc;

use parking_lot::RwLock;
use relaycrm_common::{BestEffort, CredentialSlot, CredentialStore, StoreError};
use relaycrm_domain::{AuthState, TokenPair, UserProfile};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Result of persisting a renewed token pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalWrite {
    /// The session is unchanged; the new tokens are now current
    Applied,
    /// The session was cleared or replaced while the refresh was in flight
    Stale,
}

#[derive(Debug, Default)]
struct Mirror {
    access: Option<String>,
    refresh: Option<String>,
    user: Option<UserProfile>,
    generation: u64,
    loaded: bool,
}

impl Mirror {
    fn derived_state(&self) -> AuthState {
        if !self.loaded {
            return AuthState::Initializing;
        }
        match (&self.access, &self.user) {
            (Some(_), Some(user)) => AuthState::Authenticated(user.clone()),
            _ => AuthState::Unauthenticated,
        }
    }

    fn clear(&mut self) {
        self.access = None;
        self.refresh = None;
        self.user = None;
        self.generation += 1;
        self.loaded = true;
    }
}

/// Credential owner shared by the pipeline, the renewal paths, and the
/// session facade
pub struct CredentialVault {
    store: Arc<dyn CredentialStore>,
    mirror: RwLock<Mirror>,
    state: watch::Sender<AuthState>,
    write_lock: Mutex<()>,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(AuthState::Initializing);
        Self { store, mirror: RwLock::new(Mirror::default()), state, write_lock: Mutex::new(()) }
    }

    /// Populate the mirror from the store
    ///
    /// Returns `true` when both an access token and a profile were restored.
    /// A cached profile that no longer parses is treated as absent.
    ///
    /// # Errors
    ///
    /// Propagates store read failures; the mirror is left empty and the state
    /// becomes `Unauthenticated`.
    pub async fn load(&self) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;

        let loaded = self.read_slots().await;
        let mut mirror = self.mirror.write();
        mirror.loaded = true;

        let (access, refresh, user) = match loaded {
            Ok(slots) => slots,
            Err(err) => {
                drop(mirror);
                self.publish();
                return Err(err);
            }
        };

        mirror.access = access;
        mirror.refresh = refresh;
        mirror.user = user;
        let restored = mirror.access.is_some() && mirror.user.is_some();
        drop(mirror);

        debug!(restored, "loaded stored credentials");
        self.publish();
        Ok(restored)
    }

    async fn read_slots(
        &self,
    ) -> Result<(Option<String>, Option<String>, Option<UserProfile>), StoreError> {
        let access = self.store.get(CredentialSlot::AccessToken).await?;
        let refresh = self.store.get(CredentialSlot::RefreshToken).await?;
        let user = self.store.get(CredentialSlot::UserProfile).await?.and_then(|raw| {
            serde_json::from_str::<UserProfile>(&raw)
                .map_err(|err| warn!(error = %err, "ignoring unreadable cached profile"))
                .ok()
        });
        Ok((access, refresh, user))
    }

    pub fn access_token(&self) -> Option<String> {
        self.mirror.read().access.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.mirror.read().refresh.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.mirror.read().user.clone()
    }

    /// Current session generation
    pub fn generation(&self) -> u64 {
        self.mirror.read().generation
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state transition
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Persist a fresh session from login or registration
    ///
    /// Tokens and profile reach the store before the observable state flips.
    /// A missing refresh token removes any stale one.
    ///
    /// # Errors
    ///
    /// On a store failure the partially written session is cleared from the
    /// store and the mirror, and the error is returned.
    pub async fn establish(&self, tokens: TokenPair, user: UserProfile) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        if let Err(err) = self.write_session(&tokens, &user).await {
            warn!(error = %err, "failed to persist new session; clearing partial write");
            if let Err(clear_err) = self.store.clear_all().await {
                warn!(error = %clear_err, "failed to clear partial session");
            }
            self.mirror.write().clear();
            self.publish();
            return Err(err);
        }

        {
            let mut mirror = self.mirror.write();
            mirror.access = Some(tokens.access_token);
            mirror.refresh = tokens.refresh_token;
            mirror.user = Some(user);
            mirror.generation += 1;
            mirror.loaded = true;
        }

        info!("session established");
        self.publish();
        Ok(())
    }

    async fn write_session(&self, tokens: &TokenPair, user: &UserProfile) -> Result<(), StoreError> {
        self.store.set(CredentialSlot::AccessToken, &tokens.access_token).await?;
        match &tokens.refresh_token {
            Some(refresh) => self.store.set(CredentialSlot::RefreshToken, refresh).await?,
            None => self.store.remove(CredentialSlot::RefreshToken).await?,
        }
        self.store.set(CredentialSlot::UserProfile, &serde_json::to_string(user)?).await
    }

    /// Persist a renewed token pair if `generation` is still current
    ///
    /// The refresh token is replaced only when the server rotated it. A store
    /// failure is logged; the mirror still takes the new tokens so in-flight
    /// requests can use them.
    pub async fn persist_renewal(&self, generation: u64, tokens: TokenPair) -> RenewalWrite {
        let _guard = self.write_lock.lock().await;

        let current = self.generation();
        if current != generation {
            debug!(started = generation, current, "discarding renewal for a superseded session");
            return RenewalWrite::Stale;
        }

        if let Err(err) = self.write_renewal(&tokens).await {
            warn!(error = %err, "failed to persist renewed tokens");
        }

        let mut mirror = self.mirror.write();
        mirror.access = Some(tokens.access_token);
        if tokens.refresh_token.is_some() {
            mirror.refresh = tokens.refresh_token;
        }
        RenewalWrite::Applied
    }

    async fn write_renewal(&self, tokens: &TokenPair) -> Result<(), StoreError> {
        self.store.set(CredentialSlot::AccessToken, &tokens.access_token).await?;
        if let Some(refresh) = &tokens.refresh_token {
            self.store.set(CredentialSlot::RefreshToken, refresh).await?;
        }
        Ok(())
    }

    /// Replace the cached profile of the current session
    ///
    /// Ignored when no session is active.
    ///
    /// # Errors
    ///
    /// Propagates store write failures.
    pub async fn update_user(&self, user: UserProfile) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        if self.mirror.read().access.is_none() {
            return Ok(());
        }

        self.store.set(CredentialSlot::UserProfile, &serde_json::to_string(&user)?).await?;
        self.mirror.write().user = Some(user);
        self.publish();
        Ok(())
    }

    /// Remove every credential and end the session
    ///
    /// The in-memory session is cleared even when the store fails.
    pub async fn clear(&self) -> BestEffort<StoreError> {
        let _guard = self.write_lock.lock().await;

        let outcome = BestEffort::from_result(self.store.clear_all().await);
        if let Some(err) = outcome.ignored() {
            warn!(error = %err, "failed to clear stored credentials");
        }

        self.mirror.write().clear();
        info!("session cleared");
        self.publish();
        outcome
    }

    fn publish(&self) {
        let next = self.mirror.read().derived_state();
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
