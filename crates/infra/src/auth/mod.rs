//! Identity provider adapter

pub mod client;

pub use client::ProviderClient;
