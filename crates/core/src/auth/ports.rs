//! Port traits for the session core
//!
//! These traits keep network, navigation and tab storage outside the core so
//! that the state machine can be driven by mock implementations in tests.

use async_trait::async_trait;
use pingauth_domain::{ProviderMetadata, Result, TokenResponse, TokenTypeHint, UserIdentity};

/// Trait for identity provider operations
///
/// Implementations prefer discovered endpoints over configured fallback paths
/// once discovery metadata is cached.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Build the authorization URL for a full-page redirect
    ///
    /// Generates fresh PKCE material and stores the verifier, state and
    /// nonce for the callback.
    ///
    /// # Errors
    /// Returns `Configuration` if the issuer or client id is missing or
    /// malformed. Nothing is stored in that case.
    fn build_authorization_url(&self) -> Result<String>;

    /// Exchange an authorization code for tokens
    ///
    /// The pending verifier and state are consumed whether or not the
    /// exchange succeeds.
    ///
    /// # Errors
    /// - `MissingPkceMaterial` if no state or verifier is pending
    /// - `CsrfMismatch` if `state` differs from the stored state; no request
    ///   is sent
    /// - `Provider` if the token endpoint rejects the code
    async fn exchange_code_for_tokens(&self, code: &str, state: &str) -> Result<TokenResponse>;

    /// Exchange a refresh token for fresh tokens
    ///
    /// # Errors
    /// Returns `Provider` if the provider rejects the refresh token; callers
    /// treat this as session-ending.
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenResponse>;

    /// Revoke a token; failures are logged and never returned.
    async fn revoke_token(&self, token: &str, hint: TokenTypeHint);

    /// Build the end-session URL
    ///
    /// # Errors
    /// Returns `Configuration` if the issuer is malformed.
    fn build_logout_url(&self, id_token_hint: Option<&str>) -> Result<String>;

    /// Fetch the user's claims from the user-info endpoint
    ///
    /// # Errors
    /// Returns `Provider` on a non-success response.
    async fn fetch_user_info(&self, access_token: &str) -> Result<UserIdentity>;

    /// Resolve discovery metadata, degrading to `None` on any failure
    async fn resolve_discovery(&self) -> Option<ProviderMetadata>;
}

/// Full-page navigation performed on behalf of the session core
///
/// Login, logout and unrecoverable 401s hand control to the navigator; none
/// of them expect control to come back.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str);
}

/// Short-lived, tab-scoped key/value storage
///
/// Holds PKCE material and the return URL between login and callback.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);

    /// Read and delete in one step
    fn take(&self, key: &str) -> Option<String>;

    fn remove(&self, key: &str);
}
