//! Domain types and models

pub mod auth;
pub mod session;
pub mod user;

pub use auth::{
    AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, RefreshRequest,
    RefreshResponse, RegisterRequest, ServerErrorBody,
};
pub use session::{AuthState, TokenPair};
pub use user::UserProfile;
