#![allow(dead_code)]

use std::sync::Arc;

use relaycrm_common::MemoryCredentialStore;
use relaycrm_domain::SessionConfig;
use relaycrm_infra::{HttpAuthBackend, SessionService};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock CRM backend plus a session wired against it.
pub struct Harness {
    pub server: MockServer,
    pub store: MemoryCredentialStore,
    pub service: SessionService,
}

impl Harness {
    /// Session with default settings against a fresh mock server.
    pub async fn start() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Session whose configuration is adjusted by `tweak`.
    pub async fn with_config(tweak: impl FnOnce(&mut SessionConfig)) -> Self {
        let server = MockServer::start().await;
        let store = MemoryCredentialStore::new();
        let service = service_for(&server, Arc::new(store.clone()), tweak);
        Self { server, store, service }
    }

    /// Mount a successful login answer and sign in through it.
    pub async fn sign_in(&self, token: &str, refresh_token: Option<&str>) {
        mount_login(&self.server, token, refresh_token).await;
        self.service
            .login("sam@relaycrm.test", "correct horse")
            .await
            .expect("login should succeed");
    }
}

/// Session wired to `server` over the given store.
pub fn service_for(
    server: &MockServer,
    store: Arc<dyn relaycrm_common::CredentialStore>,
    tweak: impl FnOnce(&mut SessionConfig),
) -> SessionService {
    let mut config = SessionConfig::default();
    config.api.base_url = format!("{}/api", server.uri());
    config.api.timeout_secs = 5;
    tweak(&mut config);

    let backend = HttpAuthBackend::new(&config.api.base_url, config.api.timeout())
        .expect("backend should build");
    SessionService::new(&config, store, Arc::new(backend)).expect("session should build")
}

/// Profile body as the backend sends it.
pub fn user_json() -> Value {
    json!({
        "id": 12,
        "email": "sam@relaycrm.test",
        "name": "Sam",
        "role": "sales",
        "team_id": 3
    })
}

/// Answer `POST /api/auth/login` with the given tokens.
pub async fn mount_login(server: &MockServer, token: &str, refresh_token: Option<&str>) {
    let mut body = json!({ "token": token, "user": user_json() });
    if let Some(refresh_token) = refresh_token {
        body["refreshToken"] = json!(refresh_token);
    }

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
