//! Short lived kubeconfig for a cluster

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::cluster::GetCredentialsRequest;
use crate::session::{not_configured, Session};

const EXTERNAL_SUFFIX: &str = "external";

#[derive(Debug, Error, PartialEq)]
#[error("invalid duration {0:?}")]
pub struct InvalidDuration(String);

/// Parse durations like `1h30m`, `90s` or `1.5h`
///
/// Accepts a sequence of decimal numbers, each with a unit out of
/// `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare `0` is allowed.
pub fn parse_duration(input: &str) -> Result<Duration, InvalidDuration> {
    let invalid = || InvalidDuration(input.to_string());

    let rest = input.strip_prefix('+').unwrap_or(input);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut nanos = 0f64;
    let mut rest = rest;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(invalid());
        }
        let value: f64 = number.parse().map_err(|_| invalid())?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };

        nanos += value * scale;
        rest = tail;
    }

    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawKubeconfig {
    clusters: Vec<NamedCluster>,
    users: Vec<NamedUser>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NamedCluster {
    name: String,
    cluster: ClusterEntry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct ClusterEntry {
    server: String,
    certificate_authority_data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NamedUser {
    name: String,
    user: UserEntry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct UserEntry {
    client_certificate_data: String,
    client_key_data: String,
}

/// Connection details of the externally reachable cluster endpoint
#[derive(Debug, Default, PartialEq)]
pub struct ExternalAccess {
    pub host: Option<String>,
    pub client_certificate: Option<String>,
    pub client_key: Option<String>,
    pub cluster_ca_certificate: Option<String>,
}

impl ExternalAccess {
    fn to_dynamic(&self) -> Dynamic {
        Dynamic::object([
            ("host", Dynamic::from(self.host.clone())),
            ("client_certificate", Dynamic::from(self.client_certificate.clone())),
            ("client_key", Dynamic::from(self.client_key.clone())),
            (
                "cluster_ca_certificate",
                Dynamic::from(self.cluster_ca_certificate.clone()),
            ),
        ])
    }
}

fn external_path(field: &str) -> AttributePath {
    AttributePath::new("external").attribute(field)
}

/// Decode base64 certificate data. Failures become a warning and an empty value.
fn decode(data: &str, field: &str, diagnostics: &mut Vec<Diagnostic>) -> String {
    match STANDARD.decode(data) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            diagnostics.push(
                Diagnostic::warning("decoding failed", e.to_string())
                    .with_attribute(external_path(field)),
            );
            String::new()
        }
    }
}

/// Pull the external endpoint and credentials out of a raw kubeconfig
///
/// Nothing in here fails the read, problems are reported as warnings.
pub fn parse_kubeconfig(raw: &str, diagnostics: &mut Vec<Diagnostic>) -> ExternalAccess {
    let kubeconfig = match serde_yaml::from_str::<RawKubeconfig>(raw) {
        Ok(kubeconfig) => kubeconfig,
        Err(e) => {
            diagnostics.push(
                Diagnostic::warning("parsing raw kubeconfig failed", e.to_string())
                    .with_attribute(AttributePath::new("external")),
            );
            RawKubeconfig::default()
        }
    };

    let mut external = ExternalAccess::default();

    for named in kubeconfig
        .clusters
        .iter()
        .filter(|c| c.name.ends_with(EXTERNAL_SUFFIX))
    {
        external.host = Some(named.cluster.server.clone());
        external.cluster_ca_certificate = Some(decode(
            &named.cluster.certificate_authority_data,
            "cluster_ca_certificate",
            diagnostics,
        ));
    }
    if external.host.is_none() {
        diagnostics.push(
            Diagnostic::warning("not found", "could not be extracted")
                .with_attribute(external_path("host")),
        );
    }

    for named in kubeconfig
        .users
        .iter()
        .filter(|u| u.name.ends_with(EXTERNAL_SUFFIX))
    {
        external.client_key = Some(decode(&named.user.client_key_data, "client_key", diagnostics));
        external.client_certificate = Some(decode(
            &named.user.client_certificate_data,
            "client_certificate",
            diagnostics,
        ));
    }

    external
}

#[derive(Default)]
pub struct KubeconfigDataSource {
    session: Option<Session>,
}

impl KubeconfigDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for KubeconfigDataSource {
    fn type_name(&self) -> &str {
        "metal_kubeconfig"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let external_field = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .computed()
                .build()
        };

        let schema = SchemaBuilder::new()
            .version(0)
            .description(
                "Generates a kubeconfig that grants access to a cluster for a limited time. \
                 Use a ServiceAccount for access that does not expire.",
            )
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("UUID of the cluster")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("project", AttributeType::String)
                    .description("Project of the cluster, defaults to the provider project")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("expiration", AttributeType::String)
                    .description("How long the kubeconfig stays valid, e.g. `1h30m`")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("raw", AttributeType::String)
                    .description("The kubeconfig as returned by the API")
                    .computed()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::single_nested(
                    "external",
                    vec![
                        external_field("host", "API server address of the external endpoint"),
                        external_field("client_certificate", "PEM encoded client certificate"),
                        external_field("client_key", "PEM encoded client key"),
                        external_field("cluster_ca_certificate", "PEM encoded cluster CA"),
                    ],
                )
                .description("Credentials for the externally reachable endpoint")
                .computed()
                .sensitive()
                .build(),
            )
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        let mut diagnostics = vec![];

        if let Some(expiration) = request
            .config
            .get_optional_string(&AttributePath::new("expiration"))
        {
            if parse_duration(&expiration).is_err() {
                diagnostics.push(invalid_expiration());
            }
        }

        ValidateDataSourceConfigResponse { diagnostics }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diagnostics = vec![];

        let Some(session) = &self.session else {
            diagnostics.push(not_configured());
            return ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics,
            };
        };

        let config = request.config;
        let uuid = config
            .get_optional_string(&AttributePath::new("id"))
            .unwrap_or_default();
        let project = session.project_or_default(config.get_optional_string(&AttributePath::new("project")));

        let expiration = match config
            .get_optional_string(&AttributePath::new("expiration"))
            .map(|e| parse_duration(&e))
        {
            Some(Ok(expiration)) => expiration,
            _ => {
                diagnostics.push(invalid_expiration());
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                };
            }
        };

        let raw = match session
            .client
            .cluster()
            .get_credentials(&GetCredentialsRequest {
                uuid: uuid.clone(),
                project,
                expiration: Some(expiration),
            })
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                diagnostics.push(Diagnostic::error("Unable to generate kubeconfig", e.to_string()));
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                };
            }
        };
        tracing::trace!(cluster = %uuid, "generated kubeconfig");

        let external = parse_kubeconfig(&raw, &mut diagnostics);

        let mut state = config;
        let _ = state.set_string(&AttributePath::new("raw"), raw);
        let _ = state.set_value(&AttributePath::new("external"), external.to_dynamic());

        ReadDataSourceResponse { state, diagnostics }
    }
}

fn invalid_expiration() -> Diagnostic {
    Diagnostic::error("invalid duration", "must be of form `1h30m`")
        .with_attribute(AttributePath::new("expiration"))
}

#[async_trait]
impl DataSourceWithConfigure for KubeconfigDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];

        match Session::from_provider_data(request.provider_data) {
            Ok(session) => self.session = session,
            Err(diag) => diagnostics.push(diag),
        }

        ConfigureDataSourceResponse { diagnostics }
    }
}
