//! Kubernetes cluster resource and its state mapping

pub mod model;
mod resource_cluster;

pub use resource_cluster::ClusterResource;
pub(crate) use resource_cluster::maintenance_attributes;
