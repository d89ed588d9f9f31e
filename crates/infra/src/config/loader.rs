//! Configuration loader
//!
//! Loads [`AuthConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Loads a `.env` file into the environment when one is present
//! 2. Attempts to build the configuration from `PINGAUTH_*` variables
//! 3. If incomplete, falls back to loading from file
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `PINGAUTH_ISSUER`: Identity provider base URL (required)
//! - `PINGAUTH_CLIENT_ID`: OAuth client identifier (required)
//! - `PINGAUTH_REDIRECT_URI`: Callback URL (required)
//! - `PINGAUTH_LOGOUT_URI`: Post-logout redirect URL (required)
//! - `PINGAUTH_SCOPE`: Requested scopes
//! - `PINGAUTH_API_BASE_URL`: Base URL of the application API
//! - `PINGAUTH_REFRESH_BUFFER_SECONDS`: Refresh this long before expiry
//! - `PINGAUTH_CHECK_INTERVAL_SECONDS`: Background expiry check interval
//! - `PINGAUTH_HTTP_TIMEOUT_SECONDS`: Bound on every network call
//! - `PINGAUTH_DISCOVERY_ENABLED`: Whether to fetch the discovery document
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./pingauth.{json,toml}` or `./config.{json,toml}` (current working
//!    directory)
//! 2. The same names in the parent and grandparent directories
//! 3. Relative to executable location

use std::path::{Path, PathBuf};

use pingauth_domain::{AuthConfig, AuthError, Result};

const ENV_PREFIX: &str = "PINGAUTH_";
const CONFIG_FILE_NAMES: [&str; 4] =
    ["pingauth.json", "pingauth.toml", "config.json", "config.toml"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables (after reading `.env`).
/// If any required variables are missing, falls back to loading from a
/// config file.
///
/// # Errors
/// Returns `AuthError::Configuration` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<AuthConfig> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "dotenv_loaded"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "dotenv_unreadable"),
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `PINGAUTH_*` environment variables
///
/// # Errors
/// Returns `AuthError::Configuration` if required variables are missing or
/// have invalid values.
pub fn load_from_env() -> Result<AuthConfig> {
    load_from_lookup(|key| std::env::var(key).ok())
}

/// Build configuration from an arbitrary variable source
///
/// `lookup` receives full variable names (`PINGAUTH_ISSUER`, ...). Unset
/// optional variables keep their defaults; every missing required variable
/// is reported in one error.
///
/// # Errors
/// Returns `AuthError::Configuration` for missing required values or
/// unparsable numbers and booleans.
pub fn load_from_lookup<F>(lookup: F) -> Result<AuthConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| {
        lookup(&format!("{ENV_PREFIX}{name}"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let mut config = AuthConfig::default();
    let provider = &mut config.provider;
    provider.issuer = var("ISSUER").unwrap_or_default();
    provider.client_id = var("CLIENT_ID").unwrap_or_default();
    provider.redirect_uri = var("REDIRECT_URI").unwrap_or_default();
    provider.post_logout_redirect_uri = var("LOGOUT_URI").unwrap_or_default();
    if let Some(scope) = var("SCOPE") {
        provider.scope = scope;
    }
    if let Some(enabled) = var("DISCOVERY_ENABLED") {
        provider.discovery_enabled = parse_bool("DISCOVERY_ENABLED", &enabled)?;
    }

    if let Some(value) = var("REFRESH_BUFFER_SECONDS") {
        config.session.refresh_buffer_seconds = parse_number("REFRESH_BUFFER_SECONDS", &value)?;
    }
    if let Some(value) = var("CHECK_INTERVAL_SECONDS") {
        config.session.check_interval_seconds = parse_number("CHECK_INTERVAL_SECONDS", &value)?;
    }

    config.http.api_base_url = var("API_BASE_URL");
    if let Some(value) = var("HTTP_TIMEOUT_SECONDS") {
        config.http.timeout_seconds = parse_number("HTTP_TIMEOUT_SECONDS", &value)?;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `AuthError::Configuration` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<AuthConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AuthError::Configuration(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            AuthError::Configuration(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| AuthError::Configuration(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `AuthError::Configuration` if the format is invalid or parsing
/// fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<AuthConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| AuthError::Configuration(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AuthError::Configuration(format!("Invalid JSON format: {}", e))),
        _ => Err(AuthError::Configuration(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory, its parent and grandparent, then
/// the same locations relative to the executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| [root.clone(), root.join(".."), root.join("../..")])
        .flat_map(|dir| CONFIG_FILE_NAMES.map(|name| dir.join(name)))
        .find(|path| path.exists())
}

/// Parse a boolean value
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AuthError::Configuration(format!("Invalid {ENV_PREFIX}{name}: '{value}'"))),
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|e| AuthError::Configuration(format!("Invalid {ENV_PREFIX}{name}: {e}")))
}
