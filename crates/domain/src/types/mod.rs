//! Domain types shared by the session core and its adapters

pub mod provider;
pub mod session;
pub mod token;
pub mod user;

pub use provider::{OAuthErrorResponse, ProviderMetadata, TokenTypeHint};
pub use session::{AuthState, SessionEvent, SessionStatus};
pub use token::{expiry_from, TokenResponse, TokenSet};
pub use user::UserIdentity;
