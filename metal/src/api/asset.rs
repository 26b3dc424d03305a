//! Asset catalog: regions, partitions, machine types and Kubernetes versions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{ApiError, Client};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Asset {
    pub region: Option<Region>,
    pub machine_types: Vec<MachineType>,
    pub kubernetes: Vec<KubernetesVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub address: String,
    pub active: bool,
    /// Keyed by partition id
    pub partitions: HashMap<String, Partition>,
    pub defaults: Option<AssetDefaults>,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Partition {
    pub id: String,
    pub name: String,
    pub address: String,
    pub active: bool,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetDefaults {
    pub machine_type: String,
    pub kubernetes_version: String,
    pub worker_min: u32,
    pub worker_max: u32,
    pub partition: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineType {
    pub id: String,
    pub name: String,
    pub cpus: u32,
    #[serde(with = "super::wire::u64_string")]
    pub memory: u64,
    #[serde(with = "super::wire::u64_string")]
    pub storage: u64,
    pub cpu_description: String,
    // the API spells this field without the second "c"
    #[serde(rename = "storageDesription", alias = "storageDescription")]
    pub storage_description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesVersion {
    pub version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListAssetsResponse {
    assets: Vec<Asset>,
}

#[derive(Debug, Serialize)]
struct ListAssetsRequest {}

const LIST: &str = "api.v1.AssetService/List";

pub struct AssetApi<'a> {
    client: &'a Client,
}

impl<'a> AssetApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Asset>, ApiError> {
        let response: ListAssetsResponse = self.client.unary(LIST, &ListAssetsRequest {}).await?;
        Ok(response.assets)
    }
}
