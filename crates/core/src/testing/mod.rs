//! Test doubles for the session core ports
//!
//! Available to unit tests and, behind the `test-utils` feature, to other
//! crates' tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use pingauth_domain::{
    AuthError, ProviderMetadata, Result, TokenResponse, TokenTypeHint, UserIdentity,
};
use serde_json::Value;

use crate::auth::ports::{Navigator, ProviderApi};

/// Scriptable [`ProviderApi`] that records how it was called
pub struct MockProvider {
    authorization_url: Mutex<Result<String>>,
    exchange_response: Mutex<Result<TokenResponse>>,
    refresh_response: Mutex<Result<TokenResponse>>,
    refresh_delay: Mutex<Duration>,
    user_info: Mutex<Result<UserIdentity>>,
    logout_url: Mutex<Result<String>>,
    metadata: Mutex<Option<ProviderMetadata>>,
    exchanges: Mutex<Vec<(String, String)>>,
    revoked: Mutex<Vec<(String, TokenTypeHint)>>,
    refresh_calls: AtomicUsize,
    user_info_calls: AtomicUsize,
    discovery_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            authorization_url: Mutex::new(Ok(
                "https://auth.example.com/as/authorization.oauth2?response_type=code".to_string(),
            )),
            exchange_response: Mutex::new(Ok(
                TokenResponse::bearer("access-1", 3600).with_refresh_token("refresh-1")
            )),
            refresh_response: Mutex::new(Ok(TokenResponse::bearer("access-2", 3600))),
            refresh_delay: Mutex::new(Duration::ZERO),
            user_info: Mutex::new(Ok(UserIdentity::new("user-1"))),
            logout_url: Mutex::new(Ok(
                "https://auth.example.com/idp/init_logout.openid?client_id=test".to_string(),
            )),
            metadata: Mutex::new(None),
            exchanges: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
            user_info_calls: AtomicUsize::new(0),
            discovery_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_authorization_url(&self, url: Result<String>) {
        *self.authorization_url.lock() = url;
    }

    pub fn set_exchange_response(&self, response: Result<TokenResponse>) {
        *self.exchange_response.lock() = response;
    }

    pub fn set_refresh_response(&self, response: Result<TokenResponse>) {
        *self.refresh_response.lock() = response;
    }

    /// Delay applied before each refresh response
    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock() = delay;
    }

    pub fn set_user_info(&self, user: Result<UserIdentity>) {
        *self.user_info.lock() = user;
    }

    pub fn set_logout_url(&self, url: Result<String>) {
        *self.logout_url.lock() = url;
    }

    pub fn set_metadata(&self, metadata: Option<ProviderMetadata>) {
        *self.metadata.lock() = metadata;
    }

    /// `(code, state)` pairs passed to the exchange
    pub fn exchanges(&self) -> Vec<(String, String)> {
        self.exchanges.lock().clone()
    }

    pub fn revoked(&self) -> Vec<(String, TokenTypeHint)> {
        self.revoked.lock().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn user_info_calls(&self) -> usize {
        self.user_info_calls.load(Ordering::SeqCst)
    }

    pub fn discovery_calls(&self) -> usize {
        self.discovery_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderApi for MockProvider {
    fn build_authorization_url(&self) -> Result<String> {
        self.authorization_url.lock().clone()
    }

    async fn exchange_code_for_tokens(&self, code: &str, state: &str) -> Result<TokenResponse> {
        self.exchanges.lock().push((code.to_string(), state.to_string()));
        self.exchange_response.lock().clone()
    }

    async fn refresh_tokens(&self, _refresh_token: &str) -> Result<TokenResponse> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.refresh_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.refresh_response.lock().clone()
    }

    async fn revoke_token(&self, token: &str, hint: TokenTypeHint) {
        self.revoked.lock().push((token.to_string(), hint));
    }

    fn build_logout_url(&self, _id_token_hint: Option<&str>) -> Result<String> {
        self.logout_url.lock().clone()
    }

    async fn fetch_user_info(&self, _access_token: &str) -> Result<UserIdentity> {
        self.user_info_calls.fetch_add(1, Ordering::SeqCst);
        self.user_info.lock().clone()
    }

    async fn resolve_discovery(&self) -> Option<ProviderMetadata> {
        self.discovery_calls.fetch_add(1, Ordering::SeqCst);
        self.metadata.lock().clone()
    }
}

/// [`Navigator`] that records every target instead of leaving the process
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    targets: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.targets.lock().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.targets.lock().len()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) {
        self.targets.lock().push(url.to_string());
    }
}

/// Convenience error for scripting transport failures
pub fn network_error() -> AuthError {
    AuthError::Network("connection refused".to_string())
}

/// Unsigned JWT around `claims`; decodes like a provider-issued token.
pub fn unsigned_jwt(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}
