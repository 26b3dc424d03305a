//! Snapshot service messages and calls

use serde::{Deserialize, Serialize};

use super::{ApiError, Client};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
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
    pub source_volume_uuid: String,
    pub source_volume_name: String,
}

#[derive(Debug, Serialize)]
struct SnapshotRef<'a> {
    uuid: &'a str,
    project: &'a str,
}

#[derive(Debug, Serialize)]
struct ListSnapshotsRequest<'a> {
    project: &'a str,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    snapshot: Option<Snapshot>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListSnapshotsResponse {
    snapshots: Vec<Snapshot>,
}

const GET: &str = "api.v1.SnapshotService/Get";
const LIST: &str = "api.v1.SnapshotService/List";

pub struct SnapshotApi<'a> {
    client: &'a Client,
}

impl<'a> SnapshotApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, uuid: &str, project: &str) -> Result<Snapshot, ApiError> {
        let response: SnapshotResponse = self
            .client
            .unary(GET, &SnapshotRef { uuid, project })
            .await?;
        response
            .snapshot
            .ok_or_else(|| ApiError::Parse(format!("{}: response carries no snapshot", GET)))
    }

    pub async fn list(&self, project: &str) -> Result<Vec<Snapshot>, ApiError> {
        let response: ListSnapshotsResponse = self
            .client
            .unary(LIST, &ListSnapshotsRequest { project })
            .await?;
        Ok(response.snapshots)
    }
}
