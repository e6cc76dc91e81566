//! Platform security integrations
//!
//! Currently this is the platform keychain, which backs the keychain
//! credential store.

pub mod keychain;

pub use keychain::{KeychainError, KeychainProvider};
