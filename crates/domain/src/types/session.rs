//! Session state machine types
//!
//! `AuthState` is the snapshot handed to observers on every transition.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::token::TokenSet;
use super::user::UserIdentity;

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Uninitialized,
    Initializing,
    Authenticated,
    Unauthenticated,
    LoggingOut,
    RefreshingInline,
}

impl SessionStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Any state may fall back to `Unauthenticated` on unrecoverable failure.
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionStatus::{
            Authenticated, Initializing, LoggingOut, RefreshingInline, Uninitialized,
            Unauthenticated,
        };

        if next == Unauthenticated {
            return true;
        }

        matches!(
            (self, next),
            (Uninitialized | Unauthenticated | Authenticated, Initializing)
                | (Initializing | RefreshingInline, Authenticated)
                | (Authenticated | Unauthenticated | Initializing | RefreshingInline, LoggingOut)
                | (Authenticated, RefreshingInline)
        )
    }

    /// Loading is reported only while initialising or logging out.
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Initializing | Self::LoggingOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
            Self::LoggingOut => "logging_out",
            Self::RefreshingInline => "refreshing_inline",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally observed authentication state
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthState {
    pub status: SessionStatus,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub user: Option<UserIdentity>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl AuthState {
    /// Snapshot for `status`, mirroring credentials from `tokens`.
    ///
    /// `is_authenticated` requires an authenticated status, a live token and
    /// a user.
    pub fn snapshot(
        status: SessionStatus,
        user: Option<UserIdentity>,
        tokens: Option<&TokenSet>,
        tokens_live: bool,
        error: Option<String>,
    ) -> Self {
        let authenticated_status =
            matches!(status, SessionStatus::Authenticated | SessionStatus::RefreshingInline);
        Self {
            status,
            is_authenticated: authenticated_status && tokens_live && user.is_some(),
            is_loading: status.is_loading(),
            user,
            access_token: tokens.map(|t| t.access_token.clone()),
            refresh_token: tokens.and_then(|t| t.refresh_token.clone()),
            id_token: tokens.and_then(|t| t.id_token.clone()),
            expires_at: tokens.and_then(|t| t.expires_at),
            error,
        }
    }
}

/// Notifications published alongside state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Background refresh failed and the session was ended.
    SessionExpired { message: String },
    LoginFailed { message: String },
    LoggedOut,
}
