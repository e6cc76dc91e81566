//! CRM API client and token renewal
//!
//! This module provides the request pipeline every authenticated call goes
//! through, the unauthenticated auth endpoints, and both renewal paths.
//!
//! # Architecture
//!
//! - `backend`: login, register, refresh, logout (never renewed)
//! - `client`: the pipeline; attaches the bearer token, retries once after a
//!   successful renewal
//! - `renewal`: single-flight refresh on 401 with a circuit breaker
//! - `scheduler`: background renewal ahead of expiry
//!
//! Tokens are never logged.

pub mod backend;
pub mod client;
pub mod errors;
pub mod renewal;
pub mod scheduler;

pub use backend::{AuthBackend, HttpAuthBackend};
pub use client::{ApiClient, ApiClientBuilder, ApiClientConfig};
pub use errors::{ApiError, ApiErrorCategory};
pub use renewal::{Exchange, ReactiveRenewal, RequestMarker};
pub use scheduler::{RenewalScheduler, RenewalTick, SchedulerConfig, SchedulerError};
