//! Session core constants
//!
//! Centralized location for storage keys, default timings and user-facing
//! messages.

// Tab-scoped storage keys
pub const STORAGE_KEY_AUTH_STATE: &str = "auth_state";
pub const STORAGE_KEY_CODE_VERIFIER: &str = "pkce_code_verifier";
pub const STORAGE_KEY_NONCE: &str = "auth_nonce";
pub const STORAGE_KEY_RETURN_URL: &str = "return_url";

// Token lifecycle
pub const DEFAULT_REFRESH_BUFFER_SECONDS: u64 = 300;
pub const DEFAULT_CHECK_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

// Routes
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_HOME_PATH: &str = "/";
pub const DEFAULT_RETURN_PATH: &str = "/dashboard";

// Provider defaults
pub const DEFAULT_SCOPE: &str = "openid profile email";
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

// Messages
pub const MSG_SESSION_EXPIRED: &str = "Session expired. Please login again.";
pub const MSG_UNAUTHORIZED: &str = "Your session has expired. Please log in again.";
pub const MSG_LOGIN_FAILED: &str = "Failed to complete login";
pub const MSG_NETWORK_ERROR: &str = "Network error. Please check your connection.";
pub const MSG_TIMEOUT: &str = "Request timed out. Please try again.";
