//! metalstack.cloud API client
//!
//! One sub-API per remote service, reached through [`Client`]:
//! `client.cluster().get(..)`, `client.ip().list(..)` and so on.

pub mod asset;
pub mod client;
pub mod cluster;
pub mod connect;
pub mod error;
pub mod ip;
pub mod method;
pub mod snapshot;
pub mod volume;
pub mod wire;

pub use client::{Client, ClientConfig, MessageStream};
pub use error::ApiError;

/// Default endpoint when neither configuration nor the token name one
pub const DEFAULT_API_URL: &str = "https://api.metalstack.cloud";
