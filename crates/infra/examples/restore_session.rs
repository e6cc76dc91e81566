//! Example: restoring a stored session and watching it change
//!
//! Loads configuration the usual way (environment, then `relaycrm.{json,toml}`),
//! restores whatever session the configured store holds and logs every state
//! transition until Ctrl-C. The stored session is left in place on exit.
//!
//! ```bash
//! RELAYCRM_API_URL=http://localhost:3000/api RELAYCRM_STORAGE_BACKEND=file \
//!     cargo run -p relaycrm-infra --example restore_session
//! ```
//!
//! Set `RELAYCRM_LOG_FORMAT=json` for JSON log lines.

use relaycrm_domain::AuthState;
use relaycrm_infra::{config, init_tracing, LogFormat, SessionService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let format = std::env::var("RELAYCRM_LOG_FORMAT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(LogFormat::Human);
    init_tracing(format);

    let config = config::load()?;
    tracing::info!(base_url = %config.api.base_url, storage = %config.storage.backend, "Starting");

    let service = SessionService::from_config(&config)?;
    let mut states = service.subscribe();

    match service.initialize().await {
        AuthState::Authenticated(user) => tracing::info!(email = %user.email, "Session restored"),
        state => tracing::info!(?state, "No stored session"),
    }

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                tracing::info!(authenticated = state.is_authenticated(), "Session state changed");
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    // Keep the stored session for the next run; only stop background renewal
    if let Err(e) = service.scheduler().stop().await {
        tracing::debug!(error = %e, "Scheduler was not running");
    }
    tracing::info!("Stopped");
    Ok(())
}
