//! Identity provider client
//!
//! reqwest implementation of [`ProviderApi`]. Endpoints come from the cached
//! discovery document when one was fetched, otherwise from the configured
//! fallback paths under the normalised issuer.

use std::sync::Arc;

use async_trait::async_trait;
use pingauth_core::auth::jwt;
use pingauth_core::{PendingExchange, PkceMaterial, ProviderApi, SessionStorage};
use pingauth_domain::constants::DISCOVERY_PATH;
use pingauth_domain::{
    normalize_issuer, AuthError, OAuthErrorResponse, ProviderConfig, ProviderMetadata, Result,
    TokenResponse, TokenTypeHint, UserIdentity,
};
use reqwest::{Method, Response};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::errors::map_transport_error;
use crate::http::HttpTransport;

const MSG_EXCHANGE_FAILED: &str = "Failed to exchange code for tokens";
const MSG_REFRESH_FAILED: &str = "Failed to refresh token";
const MSG_USER_INFO_FAILED: &str = "Failed to fetch user info";

/// [`ProviderApi`] over HTTP against the configured issuer
pub struct ProviderClient {
    config: ProviderConfig,
    transport: HttpTransport,
    storage: Arc<dyn SessionStorage>,
    discovery: OnceCell<Option<ProviderMetadata>>,
}

impl ProviderClient {
    pub fn new(
        config: ProviderConfig,
        transport: HttpTransport,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        Self { config, transport, storage, discovery: OnceCell::new() }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Wait for discovery to settle and return what it produced.
    ///
    /// The document is fetched at most once per client; a failed fetch is
    /// remembered as `None` and the fallbacks stay in use.
    pub async fn ensure_discovery_ready(&self) -> Option<ProviderMetadata> {
        if !self.config.discovery_enabled {
            return None;
        }

        self.discovery.get_or_init(|| self.fetch_discovery()).await.clone()
    }

    /// Cached discovery metadata, without waiting for an in-flight fetch
    pub fn discovered(&self) -> Option<&ProviderMetadata> {
        self.discovery.get().and_then(Option::as_ref)
    }

    pub fn authorization_endpoint(&self) -> Result<String> {
        self.endpoint(
            |m| Some(m.authorization_endpoint.as_str()),
            &self.config.endpoints.authorization,
        )
    }

    pub fn token_endpoint(&self) -> Result<String> {
        self.endpoint(|m| Some(m.token_endpoint.as_str()), &self.config.endpoints.token)
    }

    pub fn revocation_endpoint(&self) -> Result<String> {
        self.endpoint(|m| m.revocation_endpoint.as_deref(), &self.config.endpoints.revocation)
    }

    pub fn end_session_endpoint(&self) -> Result<String> {
        self.endpoint(|m| m.end_session_endpoint.as_deref(), &self.config.endpoints.end_session)
    }

    pub fn userinfo_endpoint(&self) -> Result<String> {
        self.endpoint(|m| m.userinfo_endpoint.as_deref(), &self.config.endpoints.userinfo)
    }

    /// Discovered endpoint if present, else `fallback` under the issuer.
    fn endpoint(
        &self,
        discovered: impl Fn(&ProviderMetadata) -> Option<&str>,
        fallback: &str,
    ) -> Result<String> {
        if let Some(url) = self.discovered().and_then(|m| discovered(m)).filter(|u| !u.is_empty())
        {
            return Ok(url.to_string());
        }

        let issuer = normalize_issuer(&self.config.issuer)?;
        Ok(format!("{issuer}{fallback}"))
    }

    fn client_id(&self) -> Result<&str> {
        let client_id = self.config.client_id.trim();
        if client_id.is_empty() {
            return Err(AuthError::Configuration("client_id is required".to_string()));
        }
        Ok(client_id)
    }

    async fn fetch_discovery(&self) -> Option<ProviderMetadata> {
        let issuer = match normalize_issuer(&self.config.issuer) {
            Ok(issuer) => issuer,
            Err(err) => {
                warn!(error = %err, "discovery_skipped");
                return None;
            }
        };

        let url = format!("{issuer}{DISCOVERY_PATH}");
        let response = match self.transport.send(self.transport.request(Method::GET, &url)).await {
            Ok(response) => response,
            Err(err) => {
                warn!(kind = err.label(), error = %err, "discovery_failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "discovery_failed");
            return None;
        }

        match response.json::<ProviderMetadata>().await {
            Ok(metadata) => {
                info!(issuer = %issuer, "discovery_loaded");
                Some(metadata)
            }
            Err(err) => {
                warn!(error = %err, "discovery_document_invalid");
                None
            }
        }
    }

    async fn try_revoke(&self, token: &str, hint: TokenTypeHint) -> Result<()> {
        let url = self.revocation_endpoint()?;
        let client_id = self.client_id()?;
        let request = self.transport.request(Method::POST, &url).form(&[
            ("token", token),
            ("token_type_hint", hint.as_str()),
            ("client_id", client_id),
        ]);

        let response = self.transport.send(request).await?;
        if !response.status().is_success() {
            return Err(AuthError::RevocationFailure(format!(
                "revocation endpoint answered {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }

    async fn token_request(&self, form: &[(&str, &str)], fallback: &str) -> Result<TokenResponse> {
        let url = self.token_endpoint()?;
        let response =
            self.transport.send(self.transport.request(Method::POST, &url).form(form)).await?;
        let response = ensure_success(response, fallback).await?;

        response
            .json::<TokenResponse>()
            .await
            .map_err(|err| map_transport_error(err, self.transport.timeout()))
    }
}

/// Turn a non-success response into a provider error carrying its status.
///
/// The message prefers the body's `error_description`, then `error`, then
/// `fallback`.
async fn ensure_success(response: Response, fallback: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let parsed: OAuthErrorResponse = serde_json::from_str(&body).unwrap_or_default();
    Err(AuthError::provider(Some(status.as_u16()), parsed.message_or(fallback)))
}

/// Reject an ID token whose `nonce` differs from the one sent at login.
fn check_nonce(expected: Option<&str>, id_token: Option<&str>) -> Result<()> {
    let (Some(expected), Some(id_token)) = (expected, id_token) else {
        return Ok(());
    };

    match jwt::decode_claims(id_token) {
        Ok(claims) => match claims.nonce.as_deref() {
            Some(nonce) if nonce != expected => {
                Err(AuthError::InvalidToken("ID token nonce mismatch".to_string()))
            }
            _ => Ok(()),
        },
        Err(err) => {
            debug!(error = %err, "id_token_nonce_unreadable");
            Ok(())
        }
    }
}

#[async_trait]
impl ProviderApi for ProviderClient {
    fn build_authorization_url(&self) -> Result<String> {
        let client_id = self.client_id()?;
        let endpoint = self.authorization_endpoint()?;
        let mut url = Url::parse(&endpoint).map_err(|e| {
            AuthError::Configuration(format!("invalid authorization endpoint: {e}"))
        })?;

        let material = PkceMaterial::generate();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scope)
            .append_pair("state", &material.state)
            .append_pair("code_challenge", &material.code_challenge)
            .append_pair("code_challenge_method", material.challenge_method())
            .append_pair("nonce", &material.nonce);

        PendingExchange::save(self.storage.as_ref(), &material);
        debug!("authorization_url_built");
        Ok(url.into())
    }

    #[instrument(skip_all)]
    async fn exchange_code_for_tokens(&self, code: &str, state: &str) -> Result<TokenResponse> {
        let verified = PendingExchange::take(self.storage.as_ref()).verify(state).map_err(|err| {
            warn!(kind = err.label(), "callback_rejected");
            err
        })?;

        let client_id = self.client_id()?;
        let tokens = self
            .token_request(
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", self.config.redirect_uri.as_str()),
                    ("client_id", client_id),
                    ("code_verifier", verified.code_verifier.as_str()),
                ],
                MSG_EXCHANGE_FAILED,
            )
            .await?;

        check_nonce(verified.nonce.as_deref(), tokens.id_token.as_deref())?;
        info!("authorization_code_exchanged");
        Ok(tokens)
    }

    #[instrument(skip_all)]
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenResponse> {
        let client_id = self.client_id()?;
        self.token_request(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client_id),
            ],
            MSG_REFRESH_FAILED,
        )
        .await
    }

    #[instrument(skip(self, token))]
    async fn revoke_token(&self, token: &str, hint: TokenTypeHint) {
        match self.try_revoke(token, hint).await {
            Ok(()) => debug!(%hint, "token_revoked"),
            Err(err) => warn!(%hint, kind = err.label(), error = %err, "token_revocation_failed"),
        }
    }

    fn build_logout_url(&self, id_token_hint: Option<&str>) -> Result<String> {
        let endpoint = self.end_session_endpoint()?;
        let mut url = Url::parse(&endpoint).map_err(|e| {
            AuthError::Configuration(format!("invalid end-session endpoint: {e}"))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.config.client_id)
                .append_pair("post_logout_redirect_uri", &self.config.post_logout_redirect_uri);
            if let Some(hint) = id_token_hint {
                query.append_pair("id_token_hint", hint);
            }
        }

        Ok(url.into())
    }

    #[instrument(skip_all)]
    async fn fetch_user_info(&self, access_token: &str) -> Result<UserIdentity> {
        let url = self.userinfo_endpoint()?;
        let request = self.transport.request(Method::GET, &url).bearer_auth(access_token);
        let response = self.transport.send(request).await?;
        let response = ensure_success(response, MSG_USER_INFO_FAILED).await?;

        response
            .json::<UserIdentity>()
            .await
            .map_err(|err| map_transport_error(err, self.transport.timeout()))
    }

    async fn resolve_discovery(&self) -> Option<ProviderMetadata> {
        self.ensure_discovery_ready().await
    }
}
