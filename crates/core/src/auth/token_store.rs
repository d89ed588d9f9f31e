//! In-memory credential holder
//!
//! One `TokenStore` exists per session context and is shared by `Arc`
//! between the session controller, the refresh coordinator and the
//! authenticated HTTP client. Critical sections are short and never span an
//! await point.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pingauth_domain::constants::DEFAULT_REFRESH_BUFFER_SECONDS;
use pingauth_domain::{expiry_from, TokenResponse, TokenSet};
use tracing::debug;

use crate::time::{Clock, SystemClock};

/// Default lead time before expiry at which a token counts as expired
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(DEFAULT_REFRESH_BUFFER_SECONDS);

/// In-memory credentials for one session context
pub struct TokenStore {
    tokens: RwLock<Option<TokenSet>>,
    clock: Arc<dyn Clock>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { tokens: RwLock::new(None), clock }
    }

    /// Replace every field with `response`; `expires_at = now + expires_in`.
    pub fn set_tokens(&self, response: TokenResponse) {
        let set = TokenSet::from_response(response, self.clock.now());
        debug!(expires_at = ?set.expires_at, has_refresh = set.refresh_token.is_some(), "tokens_stored");
        *self.tokens.write() = Some(set);
    }

    /// Replace the access token and its expiry, leaving refresh and ID
    /// tokens untouched.
    ///
    /// Starts a new credential set if the store was empty.
    pub fn update_access_token(&self, access_token: impl Into<String>, expires_in: i64) {
        let expires_at = expiry_from(self.clock.now(), expires_in);
        let mut guard = self.tokens.write();
        write_access(&mut guard, access_token.into(), expires_at);
    }

    /// Apply a refresh-grant response.
    ///
    /// Refresh and ID tokens are rotated only when the provider returns new
    /// ones.
    pub fn apply_refresh(&self, response: TokenResponse) {
        let TokenResponse { access_token, refresh_token, id_token, token_type, expires_in, scope } =
            response;
        let expires_at = expiry_from(self.clock.now(), expires_in);

        let mut guard = self.tokens.write();
        let set = write_access(&mut guard, access_token, expires_at);
        if refresh_token.is_some() {
            set.refresh_token = refresh_token;
        }
        if id_token.is_some() {
            set.id_token = id_token;
        }
        if scope.is_some() {
            set.scope = scope;
        }
        set.token_type = token_type;
        debug!(expires_at = ?set.expires_at, "tokens_refreshed");
    }

    /// True if `now >= expires_at - buffer`, or nothing is stored.
    pub fn is_expired(&self, buffer: Duration) -> bool {
        let now = self.clock.now();
        self.tokens.read().as_ref().map_or(true, |set| set.is_expired_at(now, buffer))
    }

    /// Access token present and not expired with the default buffer
    pub fn has_valid_tokens(&self) -> bool {
        !self.is_expired(DEFAULT_REFRESH_BUFFER)
    }

    /// Wipe every field; idempotent.
    pub fn clear(&self) {
        if self.tokens.write().take().is_some() {
            debug!("tokens_cleared");
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens.read().as_ref().map(|set| set.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.tokens.read().as_ref().and_then(|set| set.refresh_token.clone())
    }

    pub fn id_token(&self) -> Option<String> {
        self.tokens.read().as_ref().and_then(|set| set.id_token.clone())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.tokens.read().as_ref().and_then(|set| set.expires_at)
    }

    /// Time left before expiry; zero once expired, `None` when unknown.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        let expires_at = self.expires_at()?;
        Some((expires_at - self.clock.now()).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn snapshot(&self) -> Option<TokenSet> {
        self.tokens.read().clone()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

fn write_access(
    slot: &mut Option<TokenSet>,
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
) -> &mut TokenSet {
    let set = slot.get_or_insert_with(|| TokenSet {
        access_token: String::new(),
        refresh_token: None,
        id_token: None,
        token_type: "Bearer".to_string(),
        expires_at: None,
        scope: None,
    });
    set.access_token = access_token;
    set.expires_at = expires_at;
    set
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.tokens.read();
        f.debug_struct("TokenStore")
            .field("has_tokens", &guard.is_some())
            .field("expires_at", &guard.as_ref().and_then(|s| s.expires_at))
            .finish_non_exhaustive()
    }
}
