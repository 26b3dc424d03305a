//! Volume snapshot data source

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::snapshot::Snapshot;
use crate::session::{not_configured, Session};

#[derive(Default)]
pub struct SnapshotDataSource {
    session: Option<Session>,
}

impl SnapshotDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id first, then name, then the first snapshot of the source volume
    async fn lookup(
        session: &Session,
        config: &DynamicValue,
        project: &str,
    ) -> Result<Snapshot, Diagnostic> {
        let optional = |name: &str| {
            config
                .get_optional_string(&AttributePath::new(name))
                .filter(|v| !v.is_empty())
        };

        if let Some(uuid) = optional("id") {
            return session
                .client
                .snapshot()
                .get(&uuid, project)
                .await
                .map_err(|e| {
                    Diagnostic::error(format!("failed to get snapshot with id {:?}", uuid), e.to_string())
                });
        }

        let snapshots = session
            .client
            .snapshot()
            .list(project)
            .await
            .map_err(|e| Diagnostic::error("failed to get snapshot list", e.to_string()))?;

        if let Some(name) = optional("name") {
            return snapshots.into_iter().find(|s| s.name == name).ok_or_else(|| {
                Diagnostic::error(
                    format!("failed to find snapshot with name {:?}", name),
                    "snapshot name not found in list",
                )
            });
        }

        let volume = optional("volume_id").unwrap_or_default();
        snapshots
            .into_iter()
            .find(|s| s.source_volume_uuid == volume)
            .ok_or_else(|| {
                Diagnostic::error(
                    format!("failed to find any snapshot with source volume {:?}", volume),
                    "no snapshot of the volume found in list",
                )
            })
    }
}

fn snapshot_to_state(snapshot: &Snapshot) -> DynamicValue {
    DynamicValue::new(Dynamic::object([
        ("id", Dynamic::from(snapshot.uuid.as_str())),
        ("name", Dynamic::from(snapshot.name.as_str())),
        ("volume_id", Dynamic::from(snapshot.source_volume_uuid.as_str())),
        ("project", Dynamic::from(snapshot.project.as_str())),
        ("partition", Dynamic::from(snapshot.partition.as_str())),
        ("storage_class", Dynamic::from(snapshot.storage_class.as_str())),
        ("size", Dynamic::from(snapshot.size)),
        ("usage", Dynamic::from(snapshot.usage)),
    ]))
}

#[async_trait]
impl DataSource for SnapshotDataSource {
    fn type_name(&self) -> &str {
        "metal_snapshot"
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
        let lookup = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .optional()
                .computed()
                .build()
        };

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Reads a volume snapshot by id, name or source volume")
            .attribute(lookup("id", "UUID of the snapshot"))
            .attribute(lookup("name", "Name of the snapshot"))
            .attribute(lookup(
                "volume_id",
                "UUID of the volume the snapshot was taken from",
            ))
            .attribute(lookup(
                "project",
                "Project of the snapshot, defaults to the provider project",
            ))
            .attribute(
                AttributeBuilder::new("partition", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("storage_class", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("size", AttributeType::Number)
                    .description("Size in bytes")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("usage", AttributeType::Number)
                    .description("Used bytes")
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

        let Some(session) = &self.session else {
            diagnostics.push(not_configured());
            return ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics,
            };
        };

        let project = session.project_or_default(
            request
                .config
                .get_optional_string(&AttributePath::new("project")),
        );

        let state = match Self::lookup(session, &request.config, &project).await {
            Ok(snapshot) => snapshot_to_state(&snapshot),
            Err(diag) => {
                diagnostics.push(diag);
                DynamicValue::null()
            }
        };

        ReadDataSourceResponse { state, diagnostics }
    }
}

#[async_trait]
impl DataSourceWithConfigure for SnapshotDataSource {
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
