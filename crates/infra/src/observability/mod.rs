//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events; binaries and tests call
//! [`init_tracing`] once to get them printed.

use std::io::IsTerminal;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Primary filter variable, e.g. `PINGAUTH_LOG=pingauth_core=debug`
pub const LOG_ENV_VAR: &str = "PINGAUTH_LOG";
/// `json` switches to one JSON object per event
pub const LOG_FORMAT_ENV_VAR: &str = "PINGAUTH_LOG_FORMAT";

const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global tracing subscriber.
///
/// The filter comes from `PINGAUTH_LOG`, then `RUST_LOG`, then `info`.
/// Safe to call repeatedly; only the first call has an effect, and an
/// already-installed subscriber is left in place.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let directive = filter_directive(|key| std::env::var(key).ok());
        let filter =
            EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
        let json = std::env::var(LOG_FORMAT_ENV_VAR)
            .is_ok_and(|format| format.eq_ignore_ascii_case("json"));

        let installed = if json {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .try_init()
        };

        match installed {
            Ok(()) => tracing::debug!(filter = %directive, json, "tracing_initialized"),
            Err(_) => tracing::debug!("tracing_subscriber_already_set"),
        }
    });
}

fn filter_directive(lookup: impl Fn(&str) -> Option<String>) -> String {
    [LOG_ENV_VAR, "RUST_LOG"]
        .into_iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates filter directive precedence.
    ///
    /// Assertions:
    /// - Confirms `PINGAUTH_LOG` wins over `RUST_LOG`.
    /// - Confirms blank values are skipped and `info` is the default.
    #[test]
    fn test_filter_directive_precedence() {
        let both = |key: &str| match key {
            LOG_ENV_VAR => Some("pingauth_core=debug".to_string()),
            "RUST_LOG" => Some("warn".to_string()),
            _ => None,
        };
        assert_eq!(filter_directive(both), "pingauth_core=debug");

        let blank_primary = |key: &str| match key {
            LOG_ENV_VAR => Some("  ".to_string()),
            "RUST_LOG" => Some("warn".to_string()),
            _ => None,
        };
        assert_eq!(filter_directive(blank_primary), "warn");

        assert_eq!(filter_directive(|_: &str| None), "info");
    }

    /// Validates repeated initialisation.
    ///
    /// Assertions:
    /// - Ensures calling twice does not panic.
    #[test]
    fn test_init_is_idempotent() {
        init_tracing();
        init_tracing();
        tracing::info!("tracing_ready");
    }
}
