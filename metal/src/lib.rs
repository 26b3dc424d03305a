//! Terraform provider for metalstack.cloud
//!
//! Manages Kubernetes clusters and public IP addresses, and reads volumes,
//! snapshots, kubeconfigs and the asset catalog.

pub mod api;
pub mod claims;
pub mod config;
pub mod data_sources;
pub mod resources;
pub mod session;
pub mod watcher;

pub use session::Session;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetaSchemaRequest, ProviderMetaSchemaResponse, ProviderMetadataRequest,
    ProviderMetadataResponse, ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
    StopProviderRequest, StopProviderResponse, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{has_errors, AttributePath, Diagnostic, DynamicValue, ServerCapabilities};
use tfplug::{DataSourceWithConfigure, ResourceWithConfigure};

use crate::claims::Claims;
use crate::config::{scope_defaults, Settings};

pub struct MetalProvider {
    session: Option<Session>,
}

impl Default for MetalProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MetalProvider {
    pub fn new() -> Self {
        Self { session: None }
    }

    /// Session built by the last successful `configure`
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn block_settings(config: &DynamicValue) -> Settings {
        let value = |name: &str| {
            config
                .get_optional_string(&AttributePath::new(name))
                .filter(|v| !v.is_empty())
        };
        Settings {
            api_token: value("api_token"),
            api_url: value("api_url"),
            project: value("project"),
            organization: value("organization"),
        }
    }

    async fn build_session(&self, block: &DynamicValue) -> Result<Session, Vec<Diagnostic>> {
        let settings = config::resolve(Self::block_settings(block)).map_err(|e| {
            vec![Diagnostic::error(
                "Unable to read metalstack.cloud configuration",
                e.to_string(),
            )]
        })?;

        let Some(api_token) = settings.api_token.as_deref() else {
            return Err(vec![Diagnostic::error(
                "Missing metalstack.cloud api_token",
                format!(
                    "The provider cannot create the metalstack.cloud API client as there is a missing or empty value for the metalstack.cloud API token. \
                     Set the value in the configuration or use the {} environment variable.",
                    config::ENV_API_TOKEN
                ),
            )
            .with_attribute(AttributePath::new("api_token"))]);
        };

        let claims = Claims::parse_unverified(api_token).map_err(|e| {
            vec![Diagnostic::error("Invalid API Token", e.to_string())
                .with_attribute(AttributePath::new("api_token"))]
        })?;

        let api_url = settings
            .api_url
            .clone()
            .or_else(|| claims.issuer().map(str::to_string))
            .unwrap_or_else(|| api::DEFAULT_API_URL.to_string());
        tracing::debug!(api_url = %api_url, "creating metalstack.cloud client");

        let client = api::Client::new(&api_url, api_token).map_err(|e| {
            vec![Diagnostic::error(
                "Unable to create metalstack.cloud API client",
                e.to_string(),
            )
            .with_attribute(AttributePath::new("api_url"))]
        })?;

        let mut project = settings.project.clone();
        let mut organization = settings.organization.clone();
        if project.is_none() || organization.is_none() {
            let scope = client.method().token_scoped_list().await.map_err(|e| {
                vec![Diagnostic::error("Invalid API Token", e.to_string())
                    .with_attribute(AttributePath::new("api_token"))]
            })?;
            let defaults = scope_defaults(&scope.subjects());
            tracing::debug!(
                project = ?defaults.project,
                organization = ?defaults.organization,
                "derived defaults from token scope"
            );
            project = project.or(defaults.project);
            organization = organization.or(defaults.organization);
        }

        let Some(project) = project else {
            return Err(vec![Diagnostic::error(
                "Missing metalstack.cloud project",
                format!(
                    "The provider cannot pick a default project for the metalstack.cloud API client. \
                     Set the value in the configuration, use the {} environment variable or use a token scoped to a single project.",
                    config::ENV_PROJECT
                ),
            )
            .with_attribute(AttributePath::new("project"))]);
        };

        Ok(Session::new(client, project).with_organization(organization))
    }
}

#[async_trait]
impl Provider for MetalProvider {
    fn type_name(&self) -> &str {
        "metal"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
            server_capabilities: ServerCapabilities::default(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description(
                "Manage bare-metal Kubernetes clusters on metalstack.cloud. \
                 All settings can also be taken from the METAL_STACK_CLOUD_* environment variables or a config file.",
            )
            .attribute(
                AttributeBuilder::new("api_token", AttributeType::String)
                    .description("The API token to use for authentication. Defaults to `METAL_STACK_CLOUD_API_TOKEN`.")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_url", AttributeType::String)
                    .description("The API endpoint. Defaults to `METAL_STACK_CLOUD_API_URL` or the issuer of `api_token`.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("project", AttributeType::String)
                    .description("The default project. Defaults to `METAL_STACK_CLOUD_PROJECT` or derived from `api_token`.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("organization", AttributeType::String)
                    .description("The organization. Defaults to `METAL_STACK_CLOUD_ORGANIZATION` or derived from `api_token`.")
                    .optional()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn meta_schema(
        &self,
        _ctx: Context,
        _request: ProviderMetaSchemaRequest,
    ) -> ProviderMetaSchemaResponse {
        ProviderMetaSchemaResponse {
            schema: None,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let mut diagnostics = vec![];

        for (name, env) in [
            ("api_token", config::ENV_API_TOKEN),
            ("project", config::ENV_PROJECT),
        ] {
            let path = AttributePath::new(name);
            if request.config.get(&path).is_some_and(|v| v.is_unknown()) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Unknown metalstack.cloud {}", name),
                        format!(
                            "The provider cannot create the metalstack.cloud API client as there is an unknown configuration value for {}. \
                             Either target apply the source of the value first, set the value statically in the configuration, or use the {} environment variable.",
                            name, env
                        ),
                    )
                    .with_attribute(path),
                );
            }
        }
        if has_errors(&diagnostics) {
            return ConfigureProviderResponse {
                diagnostics,
                provider_data: None,
            };
        }

        match self.build_session(&request.config).await {
            Ok(session) => {
                tracing::info!(
                    project = %session.project,
                    organization = ?session.organization,
                    "configured metalstack.cloud provider"
                );
                self.session = Some(session.clone());
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: Some(Arc::new(session)),
                }
            }
            Err(errors) => {
                diagnostics.extend(errors);
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                }
            }
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        ValidateProviderConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn stop(&self, _ctx: Context, _request: StopProviderRequest) -> StopProviderResponse {
        StopProviderResponse { error: None }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
        resources.insert(
            "metal_cluster".to_string(),
            Box::new(|| Box::new(resources::ClusterResource::new()) as Box<dyn ResourceWithConfigure>),
        );
        resources.insert(
            "metal_public_ip".to_string(),
            Box::new(|| Box::new(resources::PublicIpResource::new()) as Box<dyn ResourceWithConfigure>),
        );
        resources
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut data_sources: HashMap<String, DataSourceFactory> = HashMap::new();
        data_sources.insert(
            "metal_cluster".to_string(),
            Box::new(|| {
                Box::new(data_sources::ClusterDataSource::new()) as Box<dyn DataSourceWithConfigure>
            }),
        );
        data_sources.insert(
            "metal_public_ips".to_string(),
            Box::new(|| {
                Box::new(data_sources::PublicIpsDataSource::new()) as Box<dyn DataSourceWithConfigure>
            }),
        );
        data_sources.insert(
            "metal_volume".to_string(),
            Box::new(|| {
                Box::new(data_sources::VolumeDataSource::new()) as Box<dyn DataSourceWithConfigure>
            }),
        );
        data_sources.insert(
            "metal_snapshot".to_string(),
            Box::new(|| {
                Box::new(data_sources::SnapshotDataSource::new()) as Box<dyn DataSourceWithConfigure>
            }),
        );
        data_sources.insert(
            "metal_kubeconfig".to_string(),
            Box::new(|| {
                Box::new(data_sources::KubeconfigDataSource::new()) as Box<dyn DataSourceWithConfigure>
            }),
        );
        data_sources.insert(
            "metal_asset".to_string(),
            Box::new(|| {
                Box::new(data_sources::AssetDataSource::new()) as Box<dyn DataSourceWithConfigure>
            }),
        );
        data_sources
    }
}
