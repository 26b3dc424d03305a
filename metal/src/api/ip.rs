//! IP service messages and calls

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiError, Client};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpType {
    #[default]
    #[serde(rename = "IP_TYPE_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "IP_TYPE_EPHEMERAL")]
    Ephemeral,
    #[serde(rename = "IP_TYPE_STATIC")]
    Static,
}

impl IpType {
    /// Name used in Terraform configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            IpType::Unspecified => "unspecified",
            IpType::Ephemeral => "ephemeral",
            IpType::Static => "static",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ephemeral" => Some(IpType::Ephemeral),
            "static" => Some(IpType::Static),
            "unspecified" | "" => Some(IpType::Unspecified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ip {
    pub uuid: String,
    pub ip: String,
    pub name: String,
    pub description: String,
    pub network: String,
    pub project: String,
    #[serde(rename = "type")]
    pub ip_type: IpType,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AllocateIpRequest {
    pub project: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    /// None leaves the choice to the server
    #[serde(rename = "static", skip_serializing_if = "Option::is_none")]
    pub is_static: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateIpRequest {
    pub project: String,
    pub ip: Ip,
}

#[derive(Debug, Clone, Serialize)]
struct IpRef<'a> {
    uuid: &'a str,
    project: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ListIpsRequest<'a> {
    project: &'a str,
}

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: Option<Ip>,
}

impl IpResponse {
    fn into_ip(self, procedure: &str) -> Result<Ip, ApiError> {
        self.ip
            .ok_or_else(|| ApiError::Parse(format!("{}: response carries no ip", procedure)))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListIpsResponse {
    ips: Vec<Ip>,
}

const ALLOCATE: &str = "api.v1.IPService/Allocate";
const GET: &str = "api.v1.IPService/Get";
const LIST: &str = "api.v1.IPService/List";
const UPDATE: &str = "api.v1.IPService/Update";
const DELETE: &str = "api.v1.IPService/Delete";

pub struct IpApi<'a> {
    client: &'a Client,
}

impl<'a> IpApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn allocate(&self, request: &AllocateIpRequest) -> Result<Ip, ApiError> {
        let response: IpResponse = self.client.unary(ALLOCATE, request).await?;
        response.into_ip(ALLOCATE)
    }

    pub async fn get(&self, uuid: &str, project: &str) -> Result<Ip, ApiError> {
        let response: IpResponse = self.client.unary(GET, &IpRef { uuid, project }).await?;
        response.into_ip(GET)
    }

    pub async fn list(&self, project: &str) -> Result<Vec<Ip>, ApiError> {
        let response: ListIpsResponse = self.client.unary(LIST, &ListIpsRequest { project }).await?;
        Ok(response.ips)
    }

    pub async fn update(&self, request: &UpdateIpRequest) -> Result<Ip, ApiError> {
        let response: IpResponse = self.client.unary(UPDATE, request).await?;
        response.into_ip(UPDATE)
    }

    pub async fn delete(&self, uuid: &str, project: &str) -> Result<Ip, ApiError> {
        let response: IpResponse = self.client.unary(DELETE, &IpRef { uuid, project }).await?;
        response.into_ip(DELETE)
    }
}
