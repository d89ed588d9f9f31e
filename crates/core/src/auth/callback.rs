//! Authorization callback parsing

use pingauth_domain::{AuthError, Result};
use url::Url;

/// Code and state delivered to the redirect URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

impl CallbackParams {
    /// Parse the query string of a callback (with or without a leading `?`).
    ///
    /// # Errors
    /// - `AuthorizationDenied` when the provider returned `error`
    /// - `InvalidCallback` when `code` or `state` is missing or empty
    pub fn from_query(query: &str) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);

        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut error_description = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => error_description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(AuthError::AuthorizationDenied { error, description: error_description });
        }

        match (code.filter(|c| !c.is_empty()), state.filter(|s| !s.is_empty())) {
            (Some(code), Some(state)) => Ok(Self { code, state }),
            _ => Err(AuthError::InvalidCallback(
                "missing required parameters: code and state".to_string(),
            )),
        }
    }

    /// Parse a full callback URL.
    pub fn from_url(callback_url: &str) -> Result<Self> {
        let url = Url::parse(callback_url)
            .map_err(|e| AuthError::InvalidCallback(format!("malformed callback URL: {e}")))?;
        Self::from_query(url.query().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    /// Validates `CallbackParams::from_query` for the success scenario.
    ///
    /// Assertions:
    /// - Confirms code and state are decoded, including percent escapes.
    #[test]
    fn test_parse_success() {
        let params = assert_ok!(CallbackParams::from_query("?code=abc123&state=S%2B1"));
        assert_eq!(params, CallbackParams { code: "abc123".into(), state: "S+1".into() });
    }

    /// Validates `CallbackParams::from_query` for provider errors.
    ///
    /// Assertions:
    /// - Confirms `error` and `error_description` map to
    ///   `AuthorizationDenied`, even when a code is present.
    #[test]
    fn test_parse_provider_error() {
        let err = assert_err!(CallbackParams::from_query(
            "error=access_denied&error_description=User+cancelled&code=x&state=y",
        ));

        assert_eq!(
            err,
            AuthError::AuthorizationDenied {
                error: "access_denied".into(),
                description: Some("User cancelled".into()),
            }
        );
    }

    /// Validates `CallbackParams::from_query` for missing parameters.
    ///
    /// Assertions:
    /// - Ensures a missing or empty state yields `InvalidCallback`.
    #[test]
    fn test_parse_missing_parameters() {
        assert!(matches!(
            CallbackParams::from_query("code=abc"),
            Err(AuthError::InvalidCallback(_))
        ));
        assert!(matches!(
            CallbackParams::from_query("code=abc&state="),
            Err(AuthError::InvalidCallback(_))
        ));
    }

    /// Validates `CallbackParams::from_url`.
    ///
    /// Assertions:
    /// - Confirms a full redirect URL is parsed.
    /// - Ensures a relative URL is rejected.
    #[test]
    fn test_parse_url() {
        let params =
            CallbackParams::from_url("https://app.example.com/auth/callback?code=c&state=s")
                .expect("parse url");
        assert_eq!(params.code, "c");

        assert!(matches!(
            CallbackParams::from_url("/auth/callback?code=c&state=s"),
            Err(AuthError::InvalidCallback(_))
        ));
    }
}
