//! All public IP addresses of the provider project

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::ip::Ip;
use crate::resources::public_ip::model::ip_to_dynamic;
use crate::session::{not_configured, Session};

#[derive(Default)]
pub struct PublicIpsDataSource {
    session: Option<Session>,
}

impl PublicIpsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Stable id for a set of addresses: hex SHA-1 over the concatenated addresses
fn list_id(ips: &[Ip]) -> String {
    let mut hasher = Sha1::new();
    for ip in ips {
        hasher.update(ip.ip.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl DataSource for PublicIpsDataSource {
    fn type_name(&self) -> &str {
        "metal_public_ips"
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
        let string = |name: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .computed()
                .build()
        };
        let item = vec![
            string("id"),
            string("ip"),
            string("name"),
            string("description"),
            string("network"),
            string("project"),
            string("type"),
            AttributeBuilder::new("tags", AttributeType::List(Box::new(AttributeType::String)))
                .computed()
                .build(),
            string("created_at"),
            string("updated_at"),
        ];

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Lists the public IP addresses of the provider project")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Checksum of the listed addresses")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::list_nested("items", item)
                    .description("The public IP addresses")
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

    async fn read(&self, _ctx: Context, _request: ReadDataSourceRequest) -> ReadDataSourceResponse {
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

        match session.client.ip().list(&session.project).await {
            Ok(ips) => {
                let mut state = DynamicValue::empty_object();
                let _ = state.set_string(&AttributePath::new("id"), list_id(&ips));
                let _ = state.set_list(
                    &AttributePath::new("items"),
                    ips.iter().map(ip_to_dynamic).collect::<Vec<Dynamic>>(),
                );
                ReadDataSourceResponse { state, diagnostics }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Unable to read public IP Addresses",
                    e.to_string(),
                ));
                ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                }
            }
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for PublicIpsDataSource {
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
