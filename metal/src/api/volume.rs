//! Volume service messages and calls

use serde::{Deserialize, Serialize};

use super::{ApiError, Client};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Volume {
    pub uuid: String,
    pub name: String,
    pub project: String,
    pub partition: String,
    pub storage_class: String,
    #[serde(with = "super::wire::u64_string")]
    pub size: u64,
    #[serde(with = "super::wire::u64_string")]
    pub usage: u64,
    pub state: String,
    pub replica_count: u32,
    pub cluster_name: String,
    pub labels: Vec<VolumeLabel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeLabel {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
struct VolumeRef<'a> {
    uuid: &'a str,
    project: &'a str,
}

#[derive(Debug, Serialize)]
struct ListVolumesRequest<'a> {
    project: &'a str,
}

#[derive(Debug, Deserialize)]
struct VolumeResponse {
    volume: Option<Volume>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListVolumesResponse {
    volumes: Vec<Volume>,
}

const GET: &str = "api.v1.VolumeService/Get";
const LIST: &str = "api.v1.VolumeService/List";

pub struct VolumeApi<'a> {
    client: &'a Client,
}

impl<'a> VolumeApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, uuid: &str, project: &str) -> Result<Volume, ApiError> {
        let response: VolumeResponse = self.client.unary(GET, &VolumeRef { uuid, project }).await?;
        response
            .volume
            .ok_or_else(|| ApiError::Parse(format!("{}: response carries no volume", GET)))
    }

    pub async fn list(&self, project: &str) -> Result<Vec<Volume>, ApiError> {
        let response: ListVolumesResponse = self
            .client
            .unary(LIST, &ListVolumesRequest { project })
            .await?;
        Ok(response.volumes)
    }
}
