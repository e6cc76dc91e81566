//! # RelayCRM Infrastructure
//!
//! Client session lifecycle over HTTP.
//!
//! This crate contains:
//! - The credential vault (in-memory mirror over a `CredentialStore`)
//! - The auth backend and the request pipeline
//! - Reactive and proactive token renewal
//! - The session facade
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Builds on the stores and coordinator in `relaycrm-common`
//! - Uses the wire types and configuration from `relaycrm-domain`
//! - Contains all "impure" code (HTTP, background tasks)

pub mod api;
pub mod config;
pub mod http;
pub mod observability;
pub mod session;
pub mod storage;
pub mod vault;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used items
pub use api::{ApiClient, ApiError, AuthBackend, HttpAuthBackend, RenewalScheduler, RenewalTick};
pub use http::HttpClient;
pub use observability::{init_tracing, LogFormat};
pub use session::{LogoutReport, SessionError, SessionService};
pub use storage::build_store;
pub use vault::{CredentialVault, RenewalWrite};
