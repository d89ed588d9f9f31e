//! # PingAuth Infrastructure
//!
//! Infrastructure implementations of the session core ports.
//!
//! This crate contains:
//! - The reqwest-backed identity provider client and discovery cache
//! - The bearer-authenticated API client with single 401 recovery
//! - Configuration loading from environment and files
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Implements traits defined in `pingauth-core`
//! - Contains all "impure" code (network, environment, files)
//! - [`AuthContext`] wires one session per owner

pub mod auth;
pub mod config;
pub mod context;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use auth::ProviderClient;
pub use context::{AuthContext, AuthContextBuilder, ChannelNavigator};
pub use errors::{map_transport_error, InfraError};
pub use http::{
    ApiErrorBody, ApiResponse, AuthenticatedHttpClient, HttpTransport, RequestAttempt,
};
pub use observability::init_tracing;
