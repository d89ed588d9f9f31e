//! OAuth 2.0 token types
//!
//! `TokenResponse` is the raw body returned by the token endpoint;
//! `TokenSet` is the credential set held by the token store with an absolute
//! expiry derived from the server-declared lifetime.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

/// Token response from the authorization server (RFC 6749 §5.1)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Minimal bearer response, mostly useful in tests and fixtures.
    pub fn bearer(access_token: impl Into<String>, expires_in: i64) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            id_token: None,
            token_type: default_token_type(),
            expires_in,
            scope: None,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    #[must_use]
    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }
}

/// Credential set held by the token store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// ID token (JWT) containing user claims
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    pub token_type: String,

    /// Absolute expiry computed as `issued_at + expires_in`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Build a credential set from a token response received at `now`.
    ///
    /// A non-positive `expires_in` leaves `expires_at` unset, which the
    /// store treats as already expired.
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            expires_at: expiry_from(now, response.expires_in),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            id_token: response.id_token,
            token_type: response.token_type,
            scope: response.scope,
        }
    }

    /// True when `now` is at or past `expires_at - buffer`, or no expiry is
    /// known.
    pub fn is_expired_at(&self, now: DateTime<Utc>, buffer: std::time::Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let Ok(buffer) = ChronoDuration::from_std(buffer) else {
                    return true;
                };
                match expires_at.checked_sub_signed(buffer) {
                    Some(threshold) => now >= threshold,
                    None => true,
                }
            }
            None => true,
        }
    }
}

/// Absolute expiry for a server-declared lifetime, `None` when the lifetime
/// is not positive or does not fit the calendar.
pub fn expiry_from(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    if expires_in > 0 {
        ChronoDuration::try_seconds(expires_in).and_then(|ttl| now.checked_add_signed(ttl))
    } else {
        None
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}
