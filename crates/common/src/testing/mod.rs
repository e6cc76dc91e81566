//! Testing utilities and helpers
//!
//! - **`MemoryCredentialStore`**: re-exported in-memory store with fault
//!   injection enabled
//! - **[`tokens`]**: unsigned, JWT-shaped tokens with chosen expiries
//!
//! ## Usage
//!
//! ```rust
//! use relaycrm_common::auth::inspector;
//! use relaycrm_common::testing::mint_token;
//!
//! let fresh = mint_token(900);
//! assert!(!inspector::is_expired(&fresh));
//!
//! let stale = mint_token(-10);
//! assert!(inspector::is_expired(&stale));
//! ```

pub mod tokens;

pub use crate::auth::memory::MemoryCredentialStore;
pub use tokens::{mint_token, mint_token_for, mint_token_with_claims};
