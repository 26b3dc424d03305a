//! Resource implementations

use chrono::{DateTime, Utc};

pub mod cluster;
pub mod public_ip;

pub use cluster::ClusterResource;
pub use public_ip::PublicIpResource;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f +0000 UTC";

/// `2024-02-08 08:48:20 +0000 UTC`, unset timestamps render as the epoch
pub(crate) fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .unwrap_or_default()
        .format(TIMESTAMP_FORMAT)
        .to_string()
}
