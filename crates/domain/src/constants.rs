//! Application constants
//!
//! Centralized location for domain-level constants: auth endpoint paths and
//! session defaults.

// Auth endpoints, relative to the API base URL
pub const AUTH_LOGIN_PATH: &str = "/auth/login";
pub const AUTH_REGISTER_PATH: &str = "/auth/register";
pub const AUTH_REFRESH_PATH: &str = "/auth/refresh";
pub const AUTH_LOGOUT_PATH: &str = "/auth/logout";
pub const AUTH_ME_PATH: &str = "/auth/me";
pub const AUTH_CHANGE_PASSWORD_PATH: &str = "/auth/change-password";

// API defaults
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

// Renewal defaults
pub const DEFAULT_MAX_REFRESH_FAILURES: u32 = 3;
pub const DEFAULT_REFRESH_WAIT_MS: u64 = 2_000;
pub const DEFAULT_PROACTIVE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_PROACTIVE_HORIZON_SECS: u64 = 300;

// Storage defaults
pub const DEFAULT_STORAGE_NAMESPACE: &str = "relaycrm.session";
pub const DEFAULT_STORAGE_FILE: &str = "relaycrm-session.json";

// Fallback messages when the server gives no `error` body
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed";
pub const REGISTRATION_FAILED_MESSAGE: &str = "Registration failed";
pub const CHANGE_PASSWORD_FAILED_MESSAGE: &str = "Failed to change password";
