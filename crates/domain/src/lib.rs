//! # RelayCRM Domain
//!
//! Business domain types for the RelayCRM client session.
//!
//! This crate contains:
//! - Session and user profile types
//! - Auth endpoint request/response bodies
//! - Session configuration structures
//! - Domain error types and Result definitions
//! - Domain constants (endpoint paths, defaults)
//!
//! ## Architecture
//! - No dependencies on other RelayCRM crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
