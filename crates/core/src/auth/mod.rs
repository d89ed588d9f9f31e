//! OAuth 2.0 Authorization Code + PKCE primitives
//!
//! Everything here is transport-agnostic: the provider, the browser and the
//! session-scoped storage are reached through the traits in [`ports`], which
//! the infra crate implements over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │ SessionController │  State machine (crate::session)
//! └─────────┬─────────┘
//!           │
//!           ├──► ProviderApi         (authorize / exchange / refresh / revoke)
//!           │         │
//!           │         └──► PendingExchange  (single-use state + verifier)
//!           │
//!           ├──► RefreshCoordinator  (single-flight refresh)
//!           │         │
//!           │         └──► TokenStore       (in-memory credentials)
//!           │
//!           └──► Navigator           (redirects)
//! ```
//!
//! # Flow
//!
//! 1. [`PkceMaterial::generate`] creates verifier, challenge, state and nonce.
//! 2. [`PendingExchange::save`] parks the verifier, state and nonce in
//!    [`SessionStorage`] before the redirect.
//! 3. The callback is parsed with [`CallbackParams`]; the exchange takes the
//!    pending material exactly once and verifies the returned state.
//! 4. Tokens land in the [`TokenStore`] and expiry is tracked against its
//!    clock.

pub mod callback;
pub mod jwt;
pub mod pkce;
pub mod ports;
pub mod storage;
pub mod token_store;

pub use callback::CallbackParams;
pub use jwt::{Audience, TokenClaims};
pub use pkce::PkceMaterial;
pub use ports::{Navigator, ProviderApi, SessionStorage};
pub use storage::{MemorySessionStorage, PendingExchange, VerifiedExchange};
pub use token_store::{TokenStore, DEFAULT_REFRESH_BUFFER};
