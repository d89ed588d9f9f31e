//! Error types used throughout the session core

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for authentication and session operations
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Callback state does not match the state stored at login.
    #[error("State mismatch on callback (possible CSRF)")]
    CsrfMismatch,

    #[error("Missing PKCE material: {0}")]
    MissingPkceMaterial(String),

    #[error("Provider error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Provider { status: Option<u16>, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Token revocation failed: {0}")]
    RevocationFailure(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid callback: {0}")]
    InvalidCallback(String),

    #[error("Authorization denied: {error}{}", .description.as_ref().map(|d| format!(" ({d})")).unwrap_or_default())]
    AuthorizationDenied { error: String, description: Option<String> },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl AuthError {
    /// Stable snake_case label for structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::CsrfMismatch => "csrf_mismatch",
            Self::MissingPkceMaterial(_) => "missing_pkce_material",
            Self::Provider { .. } => "provider",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::RevocationFailure(_) => "revocation_failure",
            Self::NoRefreshToken => "no_refresh_token",
            Self::InvalidToken(_) => "invalid_token",
            Self::InvalidCallback(_) => "invalid_callback",
            Self::AuthorizationDenied { .. } => "authorization_denied",
            Self::Http { .. } => "http",
            Self::NotAuthenticated => "not_authenticated",
        }
    }

    /// Transport failures that a later attempt may not hit.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// Whether a refresh that failed with this error ends the session.
    pub fn is_session_ending(&self) -> bool {
        matches!(
            self,
            Self::NoRefreshToken | Self::Provider { .. } | Self::InvalidToken(_) | Self::NotAuthenticated
        )
    }

    /// Build a provider error from an optional status and message.
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider { status, message: message.into() }
    }
}

/// Result type alias for session core operations
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `AuthError` display formatting for provider errors.
    ///
    /// Assertions:
    /// - Confirms the status is rendered when present.
    /// - Confirms the status is omitted when absent.
    #[test]
    fn test_provider_display() {
        let with_status = AuthError::provider(Some(400), "invalid_grant");
        assert_eq!(with_status.to_string(), "Provider error (400): invalid_grant");

        let without_status = AuthError::provider(None, "boom");
        assert_eq!(without_status.to_string(), "Provider error: boom");
    }

    /// Validates `AuthError::label` and classification helpers.
    ///
    /// Assertions:
    /// - Ensures transport errors are transient and not session-ending.
    /// - Ensures provider rejections and missing refresh tokens end the
    ///   session.
    #[test]
    fn test_classification() {
        let timeout = AuthError::Timeout(Duration::from_secs(30));
        assert!(timeout.is_transient());
        assert!(!timeout.is_session_ending());
        assert_eq!(timeout.label(), "timeout");

        assert!(AuthError::NoRefreshToken.is_session_ending());
        assert!(AuthError::provider(Some(400), "invalid_grant").is_session_ending());
        assert!(!AuthError::CsrfMismatch.is_transient());
        assert_eq!(AuthError::CsrfMismatch.label(), "csrf_mismatch");
    }

    /// Validates serde tagging of `AuthError`.
    ///
    /// Assertions:
    /// - Confirms the tag/content layout used by UI collaborators.
    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(AuthError::Network("connection reset".into()))
            .expect("serialize error");
        assert_eq!(json["type"], "Network");
        assert_eq!(json["message"], "connection reset");
    }

    /// Validates display of authorization-denied errors.
    ///
    /// Assertions:
    /// - Confirms the description is appended when present.
    #[test]
    fn test_authorization_denied_display() {
        let err = AuthError::AuthorizationDenied {
            error: "access_denied".into(),
            description: Some("User cancelled".into()),
        };
        assert_eq!(err.to_string(), "Authorization denied: access_denied (User cancelled)");
    }
}
