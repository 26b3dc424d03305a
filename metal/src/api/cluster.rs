//! Cluster service messages and calls

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::client::MessageStream;
use super::{ApiError, Client};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cluster {
    pub uuid: String,
    pub name: String,
    pub project: String,
    pub partition: String,
    pub tenant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesSpec>,
    pub workers: Vec<Worker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<Maintenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Cluster {
    pub fn kubernetes_version(&self) -> &str {
        self.kubernetes
            .as_ref()
            .map(|k| k.version.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesSpec {
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Worker {
    pub name: String,
    pub machine_type: String,
    pub minsize: u32,
    pub maxsize: u32,
    pub maxsurge: u32,
    pub maxunavailable: u32,
}

/// Partial worker group change, unset fields keep their server value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerUpdate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minsize: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxsize: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxsurge: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxunavailable: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Maintenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes_autoupdate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machineimage_autoupdate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_window: Option<MaintenanceTimeWindow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceTimeWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin: Option<Time>,
    #[serde(
        with = "super::wire::optional_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Time {
    pub hour: u32,
    pub minute: u32,
    pub timezone: String,
}

/// Progress report of the operation currently running on a cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterStatus {
    pub uuid: String,
    pub progress: u32,
    pub state: String,
    #[serde(rename = "type")]
    pub operation_type: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterRequest {
    pub name: String,
    pub project: String,
    pub partition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesSpec>,
    pub workers: Vec<Worker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<Maintenance>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClusterRequest {
    pub uuid: String,
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesSpec>,
    pub workers: Vec<WorkerUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<Maintenance>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterRef {
    pub uuid: String,
    pub project: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListClustersRequest {
    pub project: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetCredentialsRequest {
    pub uuid: String,
    pub project: String,
    #[serde(
        with = "super::wire::optional_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration: Option<Duration>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WatchStatusRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub project: String,
}

#[derive(Debug, Deserialize)]
struct ClusterResponse {
    cluster: Option<Cluster>,
}

impl ClusterResponse {
    fn into_cluster(self, procedure: &str) -> Result<Cluster, ApiError> {
        self.cluster
            .ok_or_else(|| ApiError::Parse(format!("{}: response carries no cluster", procedure)))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListClustersResponse {
    clusters: Vec<Cluster>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GetCredentialsResponse {
    kubeconfig: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WatchStatusResponse {
    status: Option<ClusterStatus>,
}

const CREATE: &str = "api.v1.ClusterService/Create";
const GET: &str = "api.v1.ClusterService/Get";
const LIST: &str = "api.v1.ClusterService/List";
const UPDATE: &str = "api.v1.ClusterService/Update";
const DELETE: &str = "api.v1.ClusterService/Delete";
const GET_CREDENTIALS: &str = "api.v1.ClusterService/GetCredentials";
const WATCH_STATUS: &str = "api.v1.ClusterService/WatchStatus";

pub struct ClusterApi<'a> {
    client: &'a Client,
}

impl<'a> ClusterApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &CreateClusterRequest) -> Result<Cluster, ApiError> {
        let response: ClusterResponse = self.client.unary(CREATE, request).await?;
        response.into_cluster(CREATE)
    }

    pub async fn get(&self, uuid: &str, project: &str) -> Result<Cluster, ApiError> {
        let request = ClusterRef {
            uuid: uuid.to_string(),
            project: project.to_string(),
        };
        let response: ClusterResponse = self.client.unary(GET, &request).await?;
        response.into_cluster(GET)
    }

    pub async fn list(&self, project: &str) -> Result<Vec<Cluster>, ApiError> {
        let request = ListClustersRequest {
            project: project.to_string(),
        };
        let response: ListClustersResponse = self.client.unary(LIST, &request).await?;
        Ok(response.clusters)
    }

    pub async fn update(&self, request: &UpdateClusterRequest) -> Result<Cluster, ApiError> {
        let response: ClusterResponse = self.client.unary(UPDATE, request).await?;
        response.into_cluster(UPDATE)
    }

    pub async fn delete(&self, uuid: &str, project: &str) -> Result<Cluster, ApiError> {
        let request = ClusterRef {
            uuid: uuid.to_string(),
            project: project.to_string(),
        };
        let response: ClusterResponse = self.client.unary(DELETE, &request).await?;
        response.into_cluster(DELETE)
    }

    /// Kubeconfig for the cluster, valid for `expiration` when given
    pub async fn get_credentials(&self, request: &GetCredentialsRequest) -> Result<String, ApiError> {
        let response: GetCredentialsResponse = self.client.unary(GET_CREDENTIALS, request).await?;
        Ok(response.kubeconfig)
    }

    /// Stream of status updates for the operation running on a cluster
    pub async fn watch_status(
        &self,
        request: &WatchStatusRequest,
    ) -> Result<MessageStream<ClusterStatus>, ApiError> {
        use futures::StreamExt;

        let stream = self
            .client
            .server_stream::<_, WatchStatusResponse>(WATCH_STATUS, request)
            .await?;
        Ok(stream
            .filter_map(|message| async move {
                match message {
                    Ok(WatchStatusResponse { status: Some(status) }) => Some(Ok(status)),
                    Ok(WatchStatusResponse { status: None }) => None,
                    Err(e) => Some(Err(e)),
                }
            })
            .boxed())
    }
}
