//! Shared helpers for the infra integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use pingauth_core::testing::{unsigned_jwt, RecordingNavigator};
use pingauth_core::{MemorySessionStorage, SessionStorage};
use pingauth_domain::constants::STORAGE_KEY_AUTH_STATE;
use pingauth_domain::{AuthConfig, HttpConfig, ProviderConfig, SessionConfig};
use pingauth_infra::AuthContext;
use serde_json::{json, Value};
use wiremock::MockServer;

/// Context wired against a mock provider, with handles for assertions.
pub struct TestContext {
    pub context: AuthContext,
    pub navigator: Arc<RecordingNavigator>,
    pub storage: Arc<MemorySessionStorage>,
}

impl TestContext {
    /// State value the last login stored.
    pub fn pending_state(&self) -> String {
        self.storage.get(STORAGE_KEY_AUTH_STATE).expect("pending state after login")
    }
}

/// Configuration pointing the provider and the API at `server`.
pub fn test_config(server: &MockServer) -> AuthConfig {
    AuthConfig {
        provider: ProviderConfig {
            issuer: server.uri(),
            client_id: "web-app".to_string(),
            redirect_uri: "https://app.example.com/auth/callback".to_string(),
            post_logout_redirect_uri: "https://app.example.com/".to_string(),
            discovery_enabled: false,
            ..ProviderConfig::default()
        },
        session: SessionConfig::default(),
        http: HttpConfig {
            api_base_url: Some(format!("{}/api", server.uri())),
            ..HttpConfig::default()
        },
    }
}

pub fn test_context(config: AuthConfig) -> TestContext {
    let navigator = Arc::new(RecordingNavigator::new());
    let storage = Arc::new(MemorySessionStorage::new());
    let context = AuthContext::builder(config, navigator.clone())
        .storage(storage.clone())
        .build()
        .expect("auth context");
    TestContext { context, navigator, storage }
}

pub fn id_token(sub: &str) -> String {
    unsigned_jwt(&json!({ "sub": sub, "email": format!("{sub}@example.com") }))
}

/// Token endpoint body.
pub fn token_json(access_token: &str, refresh_token: Option<&str>, expires_in: i64) -> Value {
    let mut body = json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in,
        "id_token": id_token("user-1"),
    });
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = json!(refresh_token);
    }
    body
}
