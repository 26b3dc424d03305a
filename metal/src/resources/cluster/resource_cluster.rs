//! Kubernetes cluster resource

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure, ResourceWithImportState,
    UpdateResourceRequest, UpdateResourceResponse, ValidateResourceConfigRequest,
    ValidateResourceConfigResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{
    ListLengthValidator, NumberRangeValidator, StringLengthValidator, StringPatternValidator,
};

use super::model::{cluster_to_state, reconcile_version, ClusterModel};
use crate::api::cluster::WatchStatusRequest;
use crate::session::{not_configured, Session};
use crate::watcher::{wait_for_operation, OperationType, WatchError};

const CREATE_OPERATIONS: &[OperationType] = &[OperationType::Create, OperationType::Reconcile];
const DELETE_OPERATIONS: &[OperationType] = &[OperationType::Delete];

#[derive(Default)]
pub struct ClusterResource {
    session: Option<Session>,
}

impl ClusterResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn watch_request(uuid: &str, project: &str) -> WatchStatusRequest {
        WatchStatusRequest {
            uuid: Some(uuid.to_string()),
            project: project.to_string(),
        }
    }
}

/// Attributes shared with the `metal_cluster` data source
pub(crate) fn maintenance_attributes(computed_only: bool) -> Vec<Attribute> {
    let input = |builder: AttributeBuilder| {
        if computed_only {
            builder.computed()
        } else {
            builder.required()
        }
    };

    let mut time_zone = AttributeBuilder::new("time_zone", AttributeType::String)
        .description("Time zone of the window start, only UTC is supported")
        .computed();
    if !computed_only {
        time_zone = time_zone
            .optional()
            .default(StaticDefault::string("UTC"))
            .validator(Box::new(StringPatternValidator::new(
                "^UTC$",
                "only `UTC` as timezone allowed",
            )));
    }

    let number = |name: &str, description: &str, min: f64, max: f64| {
        let builder = input(AttributeBuilder::new(name, AttributeType::Number).description(description));
        if computed_only {
            builder.build()
        } else {
            builder
                .validator(Box::new(NumberRangeValidator {
                    min: Some(min),
                    max: Some(max),
                }))
                .build()
        }
    };

    let begin = vec![
        number("hour", "Hour the window starts", 0.0, 23.0),
        number("minute", "Minute the window starts", 0.0, 59.0),
        time_zone.build(),
    ];

    let time_window = vec![
        input(AttributeBuilder::single_nested("begin", begin)).build(),
        number("duration", "Length of the window in hours", 1.0, 24.0),
    ];

    vec![
        AttributeBuilder::new("kubernetes_autoupdate", AttributeType::Bool)
            .description("Whether kubernetes patch versions are updated automatically")
            .computed()
            .build(),
        AttributeBuilder::new("machineimage_autoupdate", AttributeType::Bool)
            .description("Whether worker machine images are updated automatically")
            .computed()
            .build(),
        input(AttributeBuilder::single_nested("time_window", time_window)).build(),
    ]
}

fn worker_attributes() -> Vec<Attribute> {
    vec![
        AttributeBuilder::new("name", AttributeType::String)
            .description("Name of the worker group")
            .required()
            .validator(Box::new(StringLengthValidator::between(2, 128)))
            .build(),
        AttributeBuilder::new("machine_type", AttributeType::String)
            .description("Machine type of the workers")
            .required()
            .build(),
        AttributeBuilder::new("min_size", AttributeType::Number)
            .description("Minimum number of workers")
            .required()
            .build(),
        AttributeBuilder::new("max_size", AttributeType::Number)
            .description("Maximum number of workers")
            .required()
            .build(),
        AttributeBuilder::new("max_surge", AttributeType::Number)
            .description("Workers added above max_size during a rolling update")
            .optional()
            .computed()
            .plan_modifier(Box::new(UseStateForUnknown))
            .build(),
        AttributeBuilder::new("max_unavailable", AttributeType::Number)
            .description("Workers allowed to be unavailable during a rolling update")
            .optional()
            .computed()
            .plan_modifier(Box::new(UseStateForUnknown))
            .build(),
    ]
}

fn location_attribute(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .optional()
        .computed()
        .plan_modifier(Box::new(UseStateForUnknown))
        .plan_modifier(Box::new(RequiresReplaceIfChanged))
        .build()
}

#[async_trait]
impl Resource for ClusterResource {
    fn type_name(&self) -> &str {
        "metal_cluster"
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
            .description("Manages a Kubernetes cluster on metalstack.cloud")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("UUID of the cluster")
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the cluster")
                    .required()
                    .validator(Box::new(StringLengthValidator::between(2, 11)))
                    .plan_modifier(Box::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(location_attribute(
                "project",
                "Project of the cluster, defaults to the provider project",
            ))
            .attribute(location_attribute(
                "partition",
                "Partition to run the cluster in",
            ))
            .attribute(location_attribute("tenant", "Tenant owning the cluster"))
            .attribute(
                AttributeBuilder::new("kubernetes", AttributeType::String)
                    .description("Kubernetes version, e.g. 1.28.11")
                    .required()
                    .validator(Box::new(StringLengthValidator::at_most(8)))
                    .validator(Box::new(StringPatternValidator::new(
                        "^[0-9]+.[0-9]+.[0-9]+$",
                        "wrong version pattern",
                    )))
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::list_nested("workers", worker_attributes())
                    .description("Worker groups of the cluster")
                    .required()
                    .validator(Box::new(ListLengthValidator {
                        min: Some(1),
                        max: None,
                    }))
                    .build(),
            )
            .attribute(
                AttributeBuilder::single_nested("maintenance", maintenance_attributes(false))
                    .description("Maintenance window of the cluster")
                    .optional()
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("created_at", AttributeType::String)
                    .description("Creation time")
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
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
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        let workers = request
            .config
            .get(&AttributePath::new("workers"))
            .and_then(Dynamic::as_list)
            .unwrap_or_default();
        for (idx, worker) in workers.iter().enumerate() {
            let min = worker.get("min_size").and_then(Dynamic::as_i64);
            let max = worker.get("max_size").and_then(Dynamic::as_i64);
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    diagnostics.push(
                        Diagnostic::error(
                            "Invalid worker group size",
                            format!("min_size {} is larger than max_size {}", min, max),
                        )
                        .with_attribute(AttributePath::new("workers").index(idx as i64)),
                    );
                }
            }
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
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

        let plan = match ClusterModel::from_value(&request.planned_state) {
            Ok(plan) => plan,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let cluster = match session
            .client
            .cluster()
            .create(&plan.create_request(&session.project))
            .await
        {
            Ok(cluster) => cluster,
            Err(e) => {
                diagnostics.push(Diagnostic::error("failed to create cluster", e.to_string()));
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    diagnostics,
                };
            }
        };
        tracing::info!(uuid = %cluster.uuid, name = %cluster.name, "cluster created");

        let watch = Self::watch_request(&cluster.uuid, &cluster.project);
        let mut latest = cluster;
        match wait_for_operation(&ctx, &session.client, &watch, CREATE_OPERATIONS, &session.watch)
            .await
        {
            Ok(()) => match session.client.cluster().get(&latest.uuid, &latest.project).await {
                Ok(cluster) => latest = cluster,
                Err(e) => diagnostics.push(Diagnostic::error("failed to get cluster", e.to_string())),
            },
            // the cluster exists, keep it in state so the next plan can reconcile
            Err(e) => diagnostics.push(Diagnostic::error(
                "cluster created inconsistently",
                e.to_string(),
            )),
        }

        let mut new_state = cluster_to_state(&latest);
        reconcile_version(&mut new_state, &plan.kubernetes, &mut diagnostics);

        CreateResourceResponse {
            new_state,
            diagnostics,
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

        let state = &request.current_state;
        let Some(uuid) = state.get_optional_string(&AttributePath::new("id")) else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics,
            };
        };
        let project =
            session.project_or_default(state.get_optional_string(&AttributePath::new("project")));

        match session.client.cluster().get(&uuid, &project).await {
            Ok(cluster) => {
                let mut new_state = cluster_to_state(&cluster);
                if let Some(expected) = state.get_optional_string(&AttributePath::new("kubernetes")) {
                    reconcile_version(&mut new_state, &expected, &mut diagnostics);
                }
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics,
                }
            }
            Err(e) if e.code() == Some("not_found") => {
                tracing::warn!(%uuid, "cluster no longer exists, removing it from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error("failed to get cluster", e.to_string()));
                ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                }
            }
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
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

        let models = ClusterModel::from_value(&request.planned_state)
            .and_then(|plan| ClusterModel::from_value(&request.prior_state).map(|state| (plan, state)));
        let (plan, state) = match models {
            Ok(models) => models,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        let update = plan.update_request(&state, &session.project);
        let cluster = match session.client.cluster().update(&update).await {
            Ok(cluster) => cluster,
            Err(e) => {
                diagnostics.push(Diagnostic::error("failed to update cluster", e.to_string()));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };
        tracing::info!(uuid = %cluster.uuid, "cluster update accepted");

        let watch = Self::watch_request(&update.uuid, &update.project);
        let mut latest = cluster;
        match wait_for_operation(&ctx, &session.client, &watch, CREATE_OPERATIONS, &session.watch)
            .await
        {
            Ok(()) => match session.client.cluster().get(&update.uuid, &update.project).await {
                Ok(cluster) => latest = cluster,
                Err(e) => diagnostics.push(Diagnostic::error("failed to get cluster", e.to_string())),
            },
            Err(e) => diagnostics.push(Diagnostic::error(
                "cluster update status inconsistent",
                e.to_string(),
            )),
        }

        let mut new_state = cluster_to_state(&latest);
        reconcile_version(&mut new_state, &plan.kubernetes, &mut diagnostics);

        UpdateResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let session = match &self.session {
            Some(session) => session,
            None => {
                diagnostics.push(not_configured());
                return DeleteResourceResponse { diagnostics };
            }
        };

        let state = &request.prior_state;
        let uuid = match state.get_string(&AttributePath::new("id")) {
            Ok(uuid) => uuid,
            Err(e) => {
                diagnostics.push(Diagnostic::error("failed to delete cluster", e.to_string()));
                return DeleteResourceResponse { diagnostics };
            }
        };
        let project =
            session.project_or_default(state.get_optional_string(&AttributePath::new("project")));
        let gone = format!("no entity with uuid:{:?} found", uuid);

        match session.client.cluster().delete(&uuid, &project).await {
            Ok(_) => {}
            Err(e) if e.to_string().contains(&gone) => {
                tracing::debug!(%uuid, "cluster already deleted");
                return DeleteResourceResponse { diagnostics };
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error("failed to delete cluster", e.to_string()));
                return DeleteResourceResponse { diagnostics };
            }
        }

        let watch = Self::watch_request(&uuid, &project);
        match wait_for_operation(&ctx, &session.client, &watch, DELETE_OPERATIONS, &session.watch)
            .await
        {
            Ok(()) => {}
            Err(WatchError::Rpc(e)) if e.to_string().contains(&gone) => {}
            Err(e) => diagnostics.push(Diagnostic::error(
                "cluster delete status inconsistent",
                e.to_string(),
            )),
        }

        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for ClusterResource {
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
impl ResourceWithImportState for ClusterResource {
    /// Import by cluster UUID or by name within the provider project
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

        let clusters = match session.client.cluster().list(&session.project).await {
            Ok(clusters) => clusters,
            Err(e) => {
                response
                    .diagnostics
                    .push(Diagnostic::error("Failed to get cluster list", e.to_string()));
                return response;
            }
        };

        match clusters.iter().find(|c| c.name == request.id) {
            Some(cluster) => {
                let mut state = DynamicValue::empty_object();
                let _ = state.set_string(&AttributePath::new("id"), cluster.uuid.clone());
                let _ = state.set_string(&AttributePath::new("name"), cluster.name.clone());
                response.imported_resources.push(ImportedResource {
                    type_name: request.type_name,
                    state,
                });
            }
            None => response.diagnostics.push(Diagnostic::error(
                format!("Failed to find cluster with name {}", request.id),
                "cluster name not found in list",
            )),
        }

        response
    }
}

#[cfg(test)]
#[path = "./resource_cluster_test.rs"]
mod resource_cluster_test;
