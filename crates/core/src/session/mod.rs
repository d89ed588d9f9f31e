//! Session lifecycle
//!
//! [`SessionController`] owns the state machine and the background refresh
//! loop; [`RefreshCoordinator`] guarantees a single refresh in flight for
//! everything sharing a token store.

pub mod controller;
pub mod refresh;

pub use controller::{SessionController, SessionControllerBuilder};
pub use refresh::{RefreshCoordinator, RefreshOutcome, RefreshRole};
