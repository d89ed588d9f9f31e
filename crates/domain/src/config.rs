//! Configuration structures
//!
//! Plain serde structs; loading from the environment or from disk lives in
//! the infrastructure crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHECK_INTERVAL_SECONDS, DEFAULT_HOME_PATH, DEFAULT_HTTP_TIMEOUT_SECONDS,
    DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_BUFFER_SECONDS, DEFAULT_RETURN_PATH, DEFAULT_SCOPE,
};
use crate::errors::{AuthError, Result};

/// Top-level configuration for one session context
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthConfig {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl AuthConfig {
    /// Check that every required provider field is present and well-formed.
    ///
    /// All missing fields are reported in a single error.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("issuer", &self.provider.issuer),
            ("client_id", &self.provider.client_id),
            ("redirect_uri", &self.provider.redirect_uri),
            ("post_logout_redirect_uri", &self.provider.post_logout_redirect_uri),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(AuthError::Configuration(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )));
        }

        normalize_issuer(&self.provider.issuer)?;
        Ok(())
    }
}

/// Identity provider settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    pub issuer: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub post_logout_redirect_uri: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub endpoints: EndpointPaths,
    #[serde(default = "default_true")]
    pub discovery_enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            client_id: String::new(),
            redirect_uri: String::new(),
            post_logout_redirect_uri: String::new(),
            scope: default_scope(),
            endpoints: EndpointPaths::default(),
            discovery_enabled: true,
        }
    }
}

/// Endpoint paths relative to the issuer, used when discovery is unavailable
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointPaths {
    pub authorization: String,
    pub token: String,
    pub revocation: String,
    pub end_session: String,
    pub userinfo: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            authorization: "/as/authorization.oauth2".to_string(),
            token: "/as/token.oauth2".to_string(),
            revocation: "/as/revoke_token.oauth2".to_string(),
            end_session: "/idp/init_logout.openid".to_string(),
            userinfo: "/idp/userinfo.openid".to_string(),
        }
    }
}

/// Session lifecycle timing and routes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub refresh_buffer_seconds: u64,
    pub check_interval_seconds: u64,
    pub login_path: String,
    pub home_path: String,
    pub default_return_path: String,
}

impl SessionConfig {
    pub fn refresh_buffer(&self) -> Duration {
        Duration::from_secs(self.refresh_buffer_seconds)
    }

    /// Interval of the background refresh check; never zero.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_buffer_seconds: DEFAULT_REFRESH_BUFFER_SECONDS,
            check_interval_seconds: DEFAULT_CHECK_INTERVAL_SECONDS,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            home_path: DEFAULT_HOME_PATH.to_string(),
            default_return_path: DEFAULT_RETURN_PATH.to_string(),
        }
    }
}

/// Outgoing HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub api_base_url: Option<String>,
    pub timeout_seconds: u64,
    pub user_agent: Option<String>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { api_base_url: None, timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECONDS, user_agent: None }
    }
}

/// Trim whitespace and trailing slashes from an issuer and require an
/// `http(s)://` scheme.
pub fn normalize_issuer(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::Configuration("issuer is not configured".to_string()));
    }

    let lower = trimmed.to_ascii_lowercase();
    let has_scheme = lower.starts_with("https://") || lower.starts_with("http://");
    let host = trimmed.split_once("://").map(|(_, rest)| rest).unwrap_or_default();
    if !has_scheme || host.is_empty() {
        return Err(AuthError::Configuration(format!(
            "issuer must be an absolute http(s) URL, got '{trimmed}'"
        )));
    }

    Ok(trimmed.to_string())
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_true() -> bool {
    true
}
