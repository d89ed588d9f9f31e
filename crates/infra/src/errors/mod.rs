//! Infrastructure-side error conversions

pub mod conversions;

pub use conversions::{map_transport_error, InfraError};
