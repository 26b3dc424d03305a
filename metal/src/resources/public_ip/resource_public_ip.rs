//! Public IP resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::RequiresReplaceIf;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure, ResourceWithImportState,
    UpdateResourceRequest, UpdateResourceResponse, ValidateResourceConfigRequest,
    ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, PlanModifierRequest, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{StringLengthValidator, StringOneOfValidator};

use super::model::{ip_from_state, ip_to_state, PublicIpModel};
use crate::api::ip::UpdateIpRequest;
use crate::session::{not_configured, Session};

#[derive(Default)]
pub struct PublicIpResource {
    session: Option<Session>,
}

impl PublicIpResource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn static_to_ephemeral(request: &PlanModifierRequest) -> bool {
    request.state_value.value.as_str() == Some("static")
        && request.plan_value.value.as_str() == Some("ephemeral")
}

#[async_trait]
impl Resource for PublicIpResource {
    fn type_name(&self) -> &str {
        "metal_public_ip"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a public IP address on metalstack.cloud")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("UUID of the address")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ip", AttributeType::String)
                    .description("The allocated address")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the address")
                    .required()
                    .validator(Box::new(StringLengthValidator::at_most(32)))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("Free form description")
                    .optional()
                    .computed()
                    .default(StaticDefault::string(""))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("network", AttributeType::String)
                    .description("Network the address belongs to")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("project", AttributeType::String)
                    .description("Project owning the address")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("Either ephemeral or static. Static addresses outlive the machines using them.")
                    .optional()
                    .computed()
                    .default(StaticDefault::string("ephemeral"))
                    .validator(Box::new(StringOneOfValidator::new(["ephemeral", "static"])))
                    .plan_modifier(Box::new(RequiresReplaceIf::new(
                        static_to_ephemeral,
                        "static addresses cannot become ephemeral",
                    )))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "tags",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .description("Tags of the address")
                .optional()
                .computed()
                .default(StaticDefault::list(vec![]))
                .build(),
            )
            .attribute(
                AttributeBuilder::new("created_at", AttributeType::String)
                    .description("Creation time")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("updated_at", AttributeType::String)
                    .description("Time of the last change")
                    .computed()
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let session = match &self.session {
            Some(session) => session,
            None => {
                diagnostics.push(not_configured());
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let allocate = PublicIpModel::from_value(&request.planned_state)
            .and_then(|plan| plan.allocate_request(&session.project));
        let allocate = match allocate {
            Ok(allocate) => allocate,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        match session.client.ip().allocate(&allocate).await {
            Ok(ip) => {
                tracing::info!(uuid = %ip.uuid, ip = %ip.ip, "public ip allocated");
                CreateResourceResponse {
                    new_state: ip_to_state(&ip),
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to allocate IP address",
                    e.to_string(),
                ));
                CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    diagnostics,
                }
            }
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let session = match &self.session {
            Some(session) => session,
            None => {
                diagnostics.push(not_configured());
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                };
            }
        };

        let Some(uuid) = request
            .current_state
            .get_optional_string(&AttributePath::new("id"))
        else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics,
            };
        };

        match session.client.ip().get(&uuid, &session.project).await {
            Ok(ip) => ReadResourceResponse {
                new_state: Some(ip_to_state(&ip)),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error("Failed to get IP address", e.to_string()));
                ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                }
            }
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = vec![];

        let session = match &self.session {
            Some(session) => session,
            None => {
                diagnostics.push(not_configured());
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        let ip = PublicIpModel::from_value(&request.planned_state)
            .and_then(|plan| plan.apply_to(ip_from_state(&request.prior_state)));
        let mut ip = match ip {
            Ok(ip) => ip,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        // the ip stays in the project it was allocated in
        ip.project = session.project_or_default(Some(ip.project));
        let update = UpdateIpRequest {
            project: ip.project.clone(),
            ip,
        };
        match session.client.ip().update(&update).await {
            Ok(ip) => UpdateResourceResponse {
                new_state: ip_to_state(&ip),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to update IP address",
                    e.to_string(),
                ));
                UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                }
            }
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let session = match &self.session {
            Some(session) => session,
            None => {
                diagnostics.push(not_configured());
                return DeleteResourceResponse { diagnostics };
            }
        };

        let ip = ip_from_state(&request.prior_state);
        let project = session.project_or_default(Some(ip.project));

        if let Err(e) = session.client.ip().delete(&ip.uuid, &project).await {
            diagnostics.push(Diagnostic::error(
                "Failed to delete IP address",
                e.to_string(),
            ));
        }

        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for PublicIpResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];

        match Session::from_provider_data(request.provider_data) {
            Ok(session) => self.session = session,
            Err(diag) => diagnostics.push(diag),
        }

        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithImportState for PublicIpResource {
    /// Import by UUID, by name, or by the address itself
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };

        if uuid::Uuid::parse_str(&request.id).is_ok() {
            tfplug::import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
            return response;
        }

        let Some(session) = &self.session else {
            response.diagnostics.push(not_configured());
            return response;
        };

        let ips = match session.client.ip().list(&session.project).await {
            Ok(ips) => ips,
            Err(e) => {
                response
                    .diagnostics
                    .push(Diagnostic::error("Failed to get all public ips", e.to_string()));
                return response;
            }
        };

        match ips
            .iter()
            .find(|ip| ip.name == request.id || ip.ip == request.id)
        {
            Some(ip) => response.imported_resources.push(ImportedResource {
                type_name: request.type_name,
                state: ip_to_state(ip),
            }),
            None => response.diagnostics.push(Diagnostic::error(
                format!("Failed to find IP with address or name {}", request.id),
                "ip address or name not found",
            )),
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Client;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::any::Any;
    use std::sync::Arc;
    use tfplug::types::{ClientCapabilities, Dynamic};

    const UUID: &str = "4f1c0f53-8a0e-4a58-b0a4-2ed5a8b0c2e1";

    fn ip_json(ip_type: &str) -> serde_json::Value {
        json!({
            "uuid": UUID,
            "ip": "212.34.83.12",
            "name": "ip",
            "description": "Test ip",
            "network": "internet",
            "project": "default-project",
            "type": ip_type,
            "tags": ["tag-1"],
            "createdAt": "2024-02-08T08:48:20Z"
        })
    }

    async fn configured_resource(url: &str) -> PublicIpResource {
        let session = Session::new(Client::new(url, "token").unwrap(), "default-project");
        let data: Arc<dyn Any + Send + Sync> = Arc::new(session);

        let mut resource = PublicIpResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(data),
                },
            )
            .await;
        resource
    }

    #[tokio::test]
    async fn test_schema_defaults() {
        let schema = PublicIpResource::new()
            .schema(Context::new(), ResourceSchemaRequest)
            .await
            .schema;

        let mut config = DynamicValue::empty_object();
        let _ = config.set_string(&AttributePath::new("name"), "ip");
        let plan = schema.plan(&DynamicValue::null(), &config);

        let planned = plan.planned_state;
        assert_eq!(planned.get_string(&AttributePath::new("type")).unwrap(), "ephemeral");
        assert_eq!(planned.get_string(&AttributePath::new("description")).unwrap(), "");
        assert_eq!(planned.get_list(&AttributePath::new("tags")).unwrap(), Vec::<Dynamic>::new());
        assert!(planned.get(&AttributePath::new("id")).unwrap().is_unknown());
    }

    #[tokio::test]
    async fn test_static_to_ephemeral_requires_replace() {
        let schema = PublicIpResource::new()
            .schema(Context::new(), ResourceSchemaRequest)
            .await
            .schema;

        let prior = ip_to_state(&crate::api::ip::Ip {
            uuid: UUID.to_string(),
            name: "ip".to_string(),
            ip_type: crate::api::ip::IpType::Static,
            ..Default::default()
        });
        let mut config = DynamicValue::empty_object();
        let _ = config.set_string(&AttributePath::new("name"), "ip");
        let _ = config.set_string(&AttributePath::new("type"), "ephemeral");

        let plan = schema.plan(&prior, &config);
        assert_eq!(plan.requires_replace, vec![AttributePath::new("type")]);
    }

    #[tokio::test]
    async fn test_create_allocates_in_session_project() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api.v1.IPService/Allocate")
            .match_body(Matcher::Json(json!({
                "project": "default-project",
                "name": "ip",
                "description": "",
                "tags": [],
                "static": true
            })))
            .with_body(json!({"ip": ip_json("IP_TYPE_STATIC")}).to_string())
            .create_async()
            .await;

        let resource = configured_resource(&server.url()).await;
        let mut planned_state = DynamicValue::empty_object();
        let _ = planned_state.set_string(&AttributePath::new("name"), "ip");
        let _ = planned_state.set_string(&AttributePath::new("description"), "");
        let _ = planned_state.set_string(&AttributePath::new("type"), "static");
        let _ = planned_state.set_list(&AttributePath::new("tags"), vec![]);
        let _ = planned_state.set_value(&AttributePath::new("project"), Dynamic::Unknown);

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "metal_public_ip".to_string(),
                    planned_state: planned_state.clone(),
                    config: planned_state,
                },
            )
            .await;

        mock.assert_async().await;
        assert!(response.diagnostics.is_empty());
        let state = response.new_state;
        assert_eq!(state.get_string(&AttributePath::new("ip")).unwrap(), "212.34.83.12");
        assert_eq!(state.get_string(&AttributePath::new("type")).unwrap(), "static");
        assert_eq!(
            state.get_string(&AttributePath::new("created_at")).unwrap(),
            "2024-02-08 08:48:20 +0000 UTC"
        );
    }

    #[tokio::test]
    async fn test_update_rejects_static_to_ephemeral() {
        let resource = configured_resource("http://127.0.0.1:1").await;

        let prior_state = ip_to_state(&crate::api::ip::Ip {
            uuid: UUID.to_string(),
            name: "ip".to_string(),
            ip_type: crate::api::ip::IpType::Static,
            ..Default::default()
        });
        let mut planned_state = prior_state.clone();
        let _ = planned_state.set_string(&AttributePath::new("type"), "ephemeral");

        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "metal_public_ip".to_string(),
                    prior_state,
                    planned_state: planned_state.clone(),
                    config: planned_state,
                },
            )
            .await;

        assert_eq!(
            response.diagnostics[0].summary,
            "Cannot update static IPs to ephemeral"
        );
    }

    #[tokio::test]
    async fn test_update_stays_in_ip_project() {
        let mut server = Server::new_async().await;
        let mut renamed = ip_json("IP_TYPE_STATIC");
        renamed["name"] = json!("renamed");
        renamed["project"] = json!("other-project");
        let mock = server
            .mock("POST", "/api.v1.IPService/Update")
            .match_body(Matcher::PartialJson(json!({
                "project": "other-project",
                "ip": {"uuid": UUID, "name": "renamed", "project": "other-project"}
            })))
            .with_body(json!({"ip": renamed}).to_string())
            .create_async()
            .await;

        let resource = configured_resource(&server.url()).await;
        let prior_state = ip_to_state(&crate::api::ip::Ip {
            uuid: UUID.to_string(),
            name: "ip".to_string(),
            project: "other-project".to_string(),
            ip_type: crate::api::ip::IpType::Static,
            ..Default::default()
        });
        let mut planned_state = prior_state.clone();
        let _ = planned_state.set_string(&AttributePath::new("name"), "renamed");

        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "metal_public_ip".to_string(),
                    prior_state,
                    planned_state: planned_state.clone(),
                    config: planned_state,
                },
            )
            .await;

        mock.assert_async().await;
        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response.new_state.get_string(&AttributePath::new("project")).unwrap(),
            "other-project"
        );
    }

    #[tokio::test]
    async fn test_import_by_address() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api.v1.IPService/List")
            .with_body(json!({"ips": [ip_json("IP_TYPE_EPHEMERAL")]}).to_string())
            .create_async()
            .await;

        let resource = configured_resource(&server.url()).await;
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "metal_public_ip".to_string(),
                    id: "212.34.83.12".to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response.imported_resources[0]
                .state
                .get_string(&AttributePath::new("id"))
                .unwrap(),
            UUID
        );

        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "metal_public_ip".to_string(),
                    id: "nope".to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        assert_eq!(response.diagnostics[0].detail, "ip address or name not found");
    }

    #[tokio::test]
    async fn test_read_failure_keeps_state() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api.v1.IPService/Get")
            .with_status(500)
            .with_body(r#"{"code":"internal","message":"boom"}"#)
            .create_async()
            .await;

        let resource = configured_resource(&server.url()).await;
        let mut current_state = DynamicValue::empty_object();
        let _ = current_state.set_string(&AttributePath::new("id"), UUID);

        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "metal_public_ip".to_string(),
                    current_state: current_state.clone(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert_eq!(response.diagnostics[0].summary, "Failed to get IP address");
        assert_eq!(response.new_state, Some(current_state));
    }
}
