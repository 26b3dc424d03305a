//! Data sources: read-only lookups against the API

mod data_source_asset;
mod data_source_cluster;
mod data_source_kubeconfig;
mod data_source_public_ips;
mod data_source_snapshot;
mod data_source_volume;

pub use data_source_asset::AssetDataSource;
pub use data_source_cluster::ClusterDataSource;
pub use data_source_kubeconfig::{parse_duration, KubeconfigDataSource};
pub use data_source_public_ips::PublicIpsDataSource;
pub use data_source_snapshot::SnapshotDataSource;
pub use data_source_volume::VolumeDataSource;
