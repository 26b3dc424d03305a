//! Public IP address resource

pub mod model;
mod resource_public_ip;

pub use resource_public_ip::PublicIpResource;
