//! Catalog of regions, machine types and Kubernetes versions

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::asset::{Asset, Region};
use crate::session::{not_configured, Session};

#[derive(Default)]
pub struct AssetDataSource {
    session: Option<Session>,
}

impl AssetDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn computed(name: &str, attribute_type: AttributeType) -> Attribute {
    AttributeBuilder::new(name, attribute_type).computed().build()
}

fn region_attributes() -> Vec<Attribute> {
    vec![
        computed("id", AttributeType::String),
        computed("name", AttributeType::String),
        computed("address", AttributeType::String),
        computed("active", AttributeType::Bool),
        AttributeBuilder::list_nested(
            "partitions",
            vec![
                computed("id", AttributeType::String),
                computed("name", AttributeType::String),
                computed("address", AttributeType::String),
                computed("active", AttributeType::Bool),
                computed("description", AttributeType::String),
            ],
        )
        .computed()
        .build(),
        AttributeBuilder::single_nested(
            "defaults",
            vec![
                computed("machine_type", AttributeType::String),
                computed("kubernetes_version", AttributeType::String),
                computed("worker_min", AttributeType::Number),
                computed("worker_max", AttributeType::Number),
                computed("partition", AttributeType::String),
            ],
        )
        .description("Values used for clusters that leave them unset")
        .computed()
        .build(),
        computed("description", AttributeType::String),
    ]
}

fn region_to_dynamic(region: &Region) -> Dynamic {
    let mut partitions: Vec<_> = region.partitions.iter().collect();
    partitions.sort_by(|a, b| a.0.cmp(b.0));

    let partitions: Vec<Dynamic> = partitions
        .into_iter()
        .map(|(_, p)| {
            Dynamic::object([
                ("id", Dynamic::from(p.id.as_str())),
                ("name", Dynamic::from(p.name.as_str())),
                ("address", Dynamic::from(p.address.as_str())),
                ("active", Dynamic::from(p.active)),
                ("description", Dynamic::from(p.description.as_str())),
            ])
        })
        .collect();

    let defaults = match &region.defaults {
        Some(d) => Dynamic::object([
            ("machine_type", Dynamic::from(d.machine_type.as_str())),
            ("kubernetes_version", Dynamic::from(d.kubernetes_version.as_str())),
            ("worker_min", Dynamic::from(d.worker_min)),
            ("worker_max", Dynamic::from(d.worker_max)),
            ("partition", Dynamic::from(d.partition.as_str())),
        ]),
        None => Dynamic::Null,
    };

    Dynamic::object([
        ("id", Dynamic::from(region.id.as_str())),
        ("name", Dynamic::from(region.name.as_str())),
        ("address", Dynamic::from(region.address.as_str())),
        ("active", Dynamic::from(region.active)),
        ("partitions", Dynamic::List(partitions)),
        ("defaults", defaults),
        ("description", Dynamic::from(region.description.as_str())),
    ])
}

fn asset_to_dynamic(asset: &Asset) -> Dynamic {
    let mut machine_types: Vec<_> = asset.machine_types.iter().collect();
    machine_types.sort_by_key(|m| m.memory);

    let machine_types: Vec<Dynamic> = machine_types
        .into_iter()
        .map(|m| {
            Dynamic::object([
                ("id", Dynamic::from(m.id.as_str())),
                ("name", Dynamic::from(m.name.as_str())),
                ("cpus", Dynamic::from(m.cpus)),
                ("memory", Dynamic::from(m.memory)),
                ("storage", Dynamic::from(m.storage)),
                ("cpu_description", Dynamic::from(m.cpu_description.as_str())),
                ("storage_description", Dynamic::from(m.storage_description.as_str())),
            ])
        })
        .collect();

    let kubernetes: Vec<Dynamic> = asset
        .kubernetes
        .iter()
        .map(|k| Dynamic::object([("version", Dynamic::from(k.version.as_str()))]))
        .collect();

    Dynamic::object([
        (
            "region",
            asset.region.as_ref().map(region_to_dynamic).unwrap_or(Dynamic::Null),
        ),
        ("machine_types", Dynamic::List(machine_types)),
        ("kubernetes", Dynamic::List(kubernetes)),
    ])
}

#[async_trait]
impl DataSource for AssetDataSource {
    fn type_name(&self) -> &str {
        "metal_asset"
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
        let item = vec![
            AttributeBuilder::single_nested("region", region_attributes())
                .computed()
                .build(),
            AttributeBuilder::list_nested(
                "machine_types",
                vec![
                    computed("id", AttributeType::String),
                    computed("name", AttributeType::String),
                    computed("cpus", AttributeType::Number),
                    computed("memory", AttributeType::Number),
                    computed("storage", AttributeType::Number),
                    computed("cpu_description", AttributeType::String),
                    computed("storage_description", AttributeType::String),
                ],
            )
            .description("Machine types of the region, smallest memory first")
            .computed()
            .build(),
            AttributeBuilder::list_nested(
                "kubernetes",
                vec![computed("version", AttributeType::String)],
            )
            .description("Supported Kubernetes versions")
            .computed()
            .build(),
        ];

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Lists the regions offered together with their machine types and Kubernetes versions")
            .attribute(
                AttributeBuilder::list_nested("items", item)
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

        let assets = match session.client.asset().list().await {
            Ok(assets) => assets,
            Err(e) => {
                diagnostics.push(Diagnostic::error("Failed to get asset list", e.to_string()));
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                };
            }
        };
        tracing::debug!(count = assets.len(), "read assets");

        let mut state = request.config;
        let _ = state.set_list(
            &AttributePath::new("items"),
            assets.iter().map(asset_to_dynamic).collect(),
        );

        ReadDataSourceResponse { state, diagnostics }
    }
}

#[async_trait]
impl DataSourceWithConfigure for AssetDataSource {
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
