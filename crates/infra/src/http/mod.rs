//! HTTP plumbing: the shared transport and the bearer-authenticated client

pub mod authenticated;
pub mod envelope;
pub mod transport;

pub use authenticated::{AuthenticatedHttpClient, RequestAttempt};
pub use envelope::{ApiErrorBody, ApiResponse};
pub use transport::{HttpTransport, HttpTransportBuilder};
