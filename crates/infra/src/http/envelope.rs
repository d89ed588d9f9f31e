//! Uniform result envelope for application API calls

use pingauth_domain::constants::{MSG_NETWORK_ERROR, MSG_TIMEOUT, MSG_UNAUTHORIZED};
use pingauth_domain::AuthError;
use serde::{Deserialize, Serialize};

pub const CODE_TIMEOUT: &str = "TIMEOUT";
pub const CODE_NETWORK_ERROR: &str = "NETWORK_ERROR";
pub const CODE_UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const CODE_HTTP_ERROR: &str = "HTTP_ERROR";
pub const CODE_UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ApiErrorBody {
    fn new(code: &str, message: impl Into<String>, status: Option<u16>) -> Self {
        Self { code: code.to_string(), message: message.into(), status }
    }
}

impl From<&AuthError> for ApiErrorBody {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::Timeout(_) => Self::new(CODE_TIMEOUT, MSG_TIMEOUT, None),
            AuthError::Network(_) => Self::new(CODE_NETWORK_ERROR, MSG_NETWORK_ERROR, None),
            AuthError::Http { status: 401, .. } => {
                Self::new(CODE_UNAUTHORIZED, MSG_UNAUTHORIZED, Some(401))
            }
            err if err.is_session_ending() => {
                Self::new(CODE_UNAUTHORIZED, MSG_UNAUTHORIZED, Some(401))
            }
            AuthError::Http { status, message } => {
                Self::new(CODE_HTTP_ERROR, message.clone(), Some(*status))
            }
            other => Self::new(CODE_UNKNOWN_ERROR, other.to_string(), None),
        }
    }
}

/// `{ success, data, error }` result of an API call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiErrorBody>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failed(error: ApiErrorBody) -> Self {
        Self { success: false, data: None, error: Some(error) }
    }

    pub fn into_result(self) -> Result<Option<T>, ApiErrorBody> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }
}

impl<T> From<pingauth_domain::Result<T>> for ApiResponse<T> {
    fn from(result: pingauth_domain::Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failed(ApiErrorBody::from(&err)),
        }
    }
}
