//! # PingAuth Domain
//!
//! Domain types and models for the PingAuth session core.
//!
//! This crate contains:
//! - Credential, identity and session state types
//! - Error types and the `Result` alias
//! - Configuration structures
//! - Constants (storage keys, default timings, messages)
//!
//! ## Architecture
//! - No dependencies on other PingAuth crates
//! - No I/O; plain serde data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
