//! # PingAuth Core
//!
//! Session logic for an OAuth 2.0 Authorization Code + PKCE client - no
//! HTTP or platform code.
//!
//! This crate contains:
//! - PKCE generation and the single-use pending exchange
//! - The in-memory token store and its clock
//! - The single-flight refresh coordinator
//! - The session state machine with its background refresh loop
//!
//! ## Architecture Principles
//! - Only depends on `pingauth-domain`
//! - The provider, navigation and session storage are ports (traits)
//! - Time is injected through [`time::Clock`] so expiry is testable

pub mod auth;
pub mod session;
pub mod time;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use auth::{
    CallbackParams, MemorySessionStorage, Navigator, PendingExchange, PkceMaterial, ProviderApi,
    SessionStorage, TokenStore, VerifiedExchange,
};
pub use session::{RefreshCoordinator, RefreshOutcome, RefreshRole, SessionController};
pub use time::{Clock, MockClock, SystemClock};
