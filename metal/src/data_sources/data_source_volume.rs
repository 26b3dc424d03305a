//! Volume data source

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::volume::Volume;
use crate::session::{not_configured, Session};

#[derive(Default)]
pub struct VolumeDataSource {
    session: Option<Session>,
}

impl VolumeDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lookup(
        session: &Session,
        config: &DynamicValue,
        project: &str,
    ) -> Result<Volume, Diagnostic> {
        if let Some(uuid) = config.get_optional_string(&AttributePath::new("id")) {
            return session
                .client
                .volume()
                .get(&uuid, project)
                .await
                .map_err(|e| Diagnostic::error("Failed to get volume", e.to_string()));
        }

        let name = config
            .get_optional_string(&AttributePath::new("name"))
            .unwrap_or_default();
        let volumes = session
            .client
            .volume()
            .list(project)
            .await
            .map_err(|e| Diagnostic::error("Failed to get volume list", e.to_string()))?;

        volumes.into_iter().find(|v| v.name == name).ok_or_else(|| {
            Diagnostic::error(
                format!("Failed to find volume with name {}", name),
                "volume name not found in list",
            )
        })
    }
}

fn volume_to_state(volume: &Volume) -> DynamicValue {
    let labels: HashMap<String, Dynamic> = volume
        .labels
        .iter()
        .map(|l| (l.key.clone(), Dynamic::from(l.value.as_str())))
        .collect();

    DynamicValue::new(Dynamic::object([
        ("id", Dynamic::from(volume.uuid.as_str())),
        ("name", Dynamic::from(volume.name.as_str())),
        ("project", Dynamic::from(volume.project.as_str())),
        ("partition", Dynamic::from(volume.partition.as_str())),
        ("storageclass", Dynamic::from(volume.storage_class.as_str())),
        ("replicacount", Dynamic::from(volume.replica_count)),
        ("clustername", Dynamic::from(volume.cluster_name.as_str())),
        ("labels", Dynamic::Map(labels)),
    ]))
}

#[async_trait]
impl DataSource for VolumeDataSource {
    fn type_name(&self) -> &str {
        "metal_volume"
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
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Reads a storage volume by id or name")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("UUID of the volume")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the volume, used when no id is given")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("project", AttributeType::String)
                    .description("Project of the volume, defaults to the provider project")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("partition", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("storageclass", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("replicacount", AttributeType::Number)
                    .description("Number of replicas kept of the volume")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("clustername", AttributeType::String)
                    .description("Cluster the volume is attached to")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("labels", AttributeType::Map(Box::new(AttributeType::String)))
                    .computed()
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
        _request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: vec![],
        }
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
            Ok(volume) => ReadDataSourceResponse {
                state: volume_to_state(&volume),
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
impl DataSourceWithConfigure for VolumeDataSource {
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
