//! JWT claim decoding
//!
//! Reads the payload segment of a JWT without verifying its signature. The
//! token was received directly from the token endpoint over TLS, so the
//! claims are used for display and expiry hints only.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use pingauth_domain::{AuthError, Result, UserIdentity};
use serde::Deserialize;
use serde_json::{Map, Value};

/// `aud` may be a single string or an array of strings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::One(value) => value == audience,
            Self::Many(values) => values.iter().any(|value| value == audience),
        }
    }
}

/// Registered claims of interest; everything else is kept in `extra`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }
}

/// Decode the payload segment into a JSON object.
pub fn decode_payload(token: &str) -> Result<Map<String, Value>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::InvalidToken("expected three dot-separated segments".to_string()));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(parts[1])
        .or_else(|_| URL_SAFE.decode(parts[1]))
        .map_err(|e| AuthError::InvalidToken(format!("payload is not base64url: {e}")))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AuthError::InvalidToken("payload is not a JSON object".to_string())),
        Err(e) => Err(AuthError::InvalidToken(format!("payload is not valid JSON: {e}"))),
    }
}

pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let payload = decode_payload(token)?;
    serde_json::from_value(Value::Object(payload))
        .map_err(|e| AuthError::InvalidToken(format!("unexpected claim types: {e}")))
}

/// Project an ID token's claims onto a [`UserIdentity`].
///
/// # Errors
/// Returns `InvalidToken` if the token cannot be decoded or has no `sub`.
pub fn extract_user_info(id_token: &str) -> Result<UserIdentity> {
    let payload = decode_payload(id_token)?;
    if !payload.get("sub").is_some_and(Value::is_string) {
        return Err(AuthError::InvalidToken("token has no subject".to_string()));
    }

    serde_json::from_value(Value::Object(payload))
        .map_err(|e| AuthError::InvalidToken(format!("unexpected identity claims: {e}")))
}

pub fn token_expiration(token: &str) -> Option<DateTime<Utc>> {
    decode_claims(token).ok().and_then(|claims| claims.expires_at())
}

/// True when the token's `exp` is within `buffer` of `now`, or the token
/// cannot be read.
pub fn is_token_expired(token: &str, buffer: std::time::Duration, now: DateTime<Utc>) -> bool {
    let Some(expires_at) = token_expiration(token) else {
        return true;
    };
    match chrono::Duration::from_std(buffer) {
        Ok(buffer) => {
            now.checked_add_signed(buffer).map_or(true, |deadline| deadline >= expires_at)
        }
        Err(_) => true,
    }
}

/// Check issuer, audience and expiry of a token.
///
/// Issuers are compared ignoring a trailing slash.
pub fn validate_token(token: &str, issuer: &str, audience: &str, now: DateTime<Utc>) -> bool {
    let Ok(claims) = decode_claims(token) else {
        return false;
    };

    let issuer_matches = claims
        .iss
        .as_deref()
        .is_some_and(|iss| iss.trim_end_matches('/') == issuer.trim_end_matches('/'));
    let audience_matches = claims.aud.as_ref().is_some_and(|aud| aud.contains(audience));
    let live = claims.expires_at().is_some_and(|exp| now < exp);

    issuer_matches && audience_matches && live
}
