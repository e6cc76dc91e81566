//! Modular common utilities shared across RelayCRM crates.
//!
//! # Safety and Quality
//!
//! This crate enforces strict safety and quality standards to ensure
//! reliability across all RelayCRM components.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: token inspection, best-effort outcomes
//! - `runtime`: async infrastructure (credential stores, renewal coordinator)
//! - `platform`: platform integrations (keychain-backed credential storage)
//! - `observability`: optional tracing (pulled in by `runtime`)
//! - `test-utils`: in-memory fakes and token minting for tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod auth;
#[cfg(feature = "foundation")]
pub mod best_effort;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod security;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", all(test, feature = "runtime")))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use auth::coordinator::{BreakerStatus, RefreshDecision, RefreshPermit, RenewalCoordinator};
#[cfg(feature = "platform")]
pub use auth::keychain::KeychainCredentialStore;
#[cfg(feature = "runtime")]
pub use auth::memory::MemoryCredentialStore;
#[cfg(feature = "runtime")]
pub use auth::store::{CredentialStore, FileCredentialStore, StoreError};
#[cfg(feature = "foundation")]
pub use auth::types::{Claims, CredentialSlot};
#[cfg(feature = "foundation")]
pub use best_effort::BestEffort;
#[cfg(feature = "platform")]
pub use security::{KeychainError, KeychainProvider};
