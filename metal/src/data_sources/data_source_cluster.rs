//! Cluster data source, looked up by id or by name

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use crate::api::cluster::Cluster;
use crate::resources::cluster::maintenance_attributes;
use crate::resources::cluster::model::cluster_to_state;
use crate::session::{not_configured, Session};

#[derive(Default)]
pub struct ClusterDataSource {
    session: Option<Session>,
}

impl ClusterDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lookup(
        session: &Session,
        config: &DynamicValue,
        project: &str,
    ) -> Result<Cluster, Diagnostic> {
        if let Some(uuid) = config.get_optional_string(&AttributePath::new("id")) {
            return session
                .client
                .cluster()
                .get(&uuid, project)
                .await
                .map_err(|e| Diagnostic::error("Failed to get cluster", e.to_string()));
        }

        let name = config
            .get_optional_string(&AttributePath::new("name"))
            .unwrap_or_default();
        let clusters = session
            .client
            .cluster()
            .list(project)
            .await
            .map_err(|e| Diagnostic::error("Failed to get cluster list", e.to_string()))?;

        clusters
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| {
                Diagnostic::error(
                    format!("Failed to find cluster with name {}", name),
                    "cluster name not found in list",
                )
            })
    }
}

#[async_trait]
impl DataSource for ClusterDataSource {
    fn type_name(&self) -> &str {
        "metal_cluster"
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
        let computed = |name: &str, r#type: AttributeType| {
            AttributeBuilder::new(name, r#type).computed().build()
        };

        let workers = vec![
            computed("name", AttributeType::String),
            computed("machine_type", AttributeType::String),
            computed("min_size", AttributeType::Number),
            computed("max_size", AttributeType::Number),
            computed("max_surge", AttributeType::Number),
            computed("max_unavailable", AttributeType::Number),
        ];

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Reads a Kubernetes cluster by id or name")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("UUID of the cluster")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the cluster, used when no id is given")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("project", AttributeType::String)
                    .description("Project of the cluster, defaults to the provider project")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(computed("partition", AttributeType::String))
            .attribute(computed("tenant", AttributeType::String))
            .attribute(computed("kubernetes", AttributeType::String))
            .attribute(
                AttributeBuilder::list_nested("workers", workers)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::single_nested("maintenance", maintenance_attributes(true))
                    .computed()
                    .build(),
            )
            .attribute(computed("created_at", AttributeType::String))
            .attribute(computed("updated_at", AttributeType::String))
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

        let is_null = |name: &str| {
            request
                .config
                .get(&AttributePath::new(name))
                .map_or(true, |v| v.is_null())
        };
        if is_null("id") && is_null("name") {
            diagnostics.push(Diagnostic::error(
                "Missing cluster identifier",
                "Either id or name must be set",
            ));
        }

        ValidateDataSourceConfigResponse { diagnostics }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diagnostics = vec![];

        let session = match &self.session {
            Some(session) => session,
            None => {
                diagnostics.push(not_configured());
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                };
            }
        };

        let project = session.project_or_default(
            request
                .config
                .get_optional_string(&AttributePath::new("project")),
        );

        match Self::lookup(session, &request.config, &project).await {
            Ok(cluster) => ReadDataSourceResponse {
                state: cluster_to_state(&cluster),
                diagnostics,
            },
            Err(diag) => {
                diagnostics.push(diag);
                ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                }
            }
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ClusterDataSource {
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
