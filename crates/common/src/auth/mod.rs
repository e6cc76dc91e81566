//! Client-side session token infrastructure
//!
//! This module holds the pieces of the session lifecycle that do not need an
//! HTTP stack: decoding tokens for local bookkeeping, persisting credentials,
//! and the shared state that keeps reactive renewal single-flight.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  inspector           │  Pure claim decoding + expiry math (untrusted)
//! └──────────────────────┘
//! ┌──────────────────────┐
//! │  CredentialStore     │  access token / refresh token / profile slots
//! └────────┬─────────────┘
//!          ├──► FileCredentialStore      (JSON document, atomic writes)
//!          ├──► KeychainCredentialStore  (platform keychain, `platform`)
//!          └──► MemoryCredentialStore    (in-process, tests)
//! ┌──────────────────────┐
//! │  RenewalCoordinator  │  is_refreshing + failure_count circuit breaker
//! └──────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: `Claims` and `CredentialSlot`
//! - **[`inspector`]**: token decoding and expiry checks
//! - **`store`**: the `CredentialStore` trait and the file backend
//! - **`keychain`**: the keychain backend
//! - **`memory`**: the in-process backend
//! - **`coordinator`**: single-flight refresh state and circuit breaker
//!
//! # Security Notes
//!
//! Nothing in this module verifies a token signature. Claims decoded here are
//! hints for scheduling renewals and must never gate an authorization
//! decision; the server remains the authority.

pub mod inspector;
pub mod types;

#[cfg(feature = "runtime")]
pub mod coordinator;
#[cfg(feature = "platform")]
pub mod keychain;
#[cfg(feature = "runtime")]
pub mod memory;
#[cfg(feature = "runtime")]
pub mod store;

pub use inspector::{
    decode, expires_at, format_remaining, is_expired, is_expiring_soon, is_well_formed,
    remaining_seconds,
};
#[cfg(feature = "platform")]
pub use keychain::KeychainCredentialStore;
pub use types::{Claims, CredentialSlot};
