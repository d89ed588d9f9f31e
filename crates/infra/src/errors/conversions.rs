//! Conversions from external infrastructure errors into domain errors.

use std::time::Duration;

use pingauth_domain::constants::DEFAULT_HTTP_TIMEOUT_SECONDS;
use pingauth_domain::AuthError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct InfraError(pub AuthError);

impl From<InfraError> for AuthError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<AuthError> for InfraError {
    fn from(value: AuthError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → AuthError */
/* -------------------------------------------------------------------------- */

/// Map a transport failure, reporting `timeout` as the elapsed bound.
///
/// Status errors (from `error_for_status`) keep their status as a provider
/// error; undecodable bodies are provider errors without a status.
pub fn map_transport_error(err: HttpError, timeout: Duration) -> AuthError {
    if err.is_timeout() {
        return AuthError::Timeout(timeout);
    }

    if err.is_connect() {
        return AuthError::Network(format!("HTTP connection failure: {err}"));
    }

    if let Some(status) = err.status() {
        let code = status.as_u16();
        let message =
            format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));
        return AuthError::provider(Some(code), message);
    }

    if err.is_decode() {
        return AuthError::provider(None, format!("malformed response body: {err}"));
    }

    AuthError::Network(err.to_string())
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(map_transport_error(value, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS)))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
