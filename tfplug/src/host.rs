//! In-process driver for the provider lifecycle
//!
//! ProviderHost plays the part of Terraform core: it validates, plans and
//! applies against a provider without any wire transport. Resources and data
//! sources are built from the provider's factories on every call and
//! configured with the provider data before use.

use crate::context::Context;
use crate::error::TfplugError;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceFactory, DataSourceSchemaRequest,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest,
};
use crate::provider::{
    ConfigureProviderRequest, Provider, ProviderSchemaRequest, ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource, ReadResourceRequest,
    ReadResourceResponse, ResourceFactory, ResourceSchemaRequest, ResourceWithConfigure,
    UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::Schema;
use crate::types::{has_errors, AttributePath, ClientCapabilities, Diagnostic, DynamicValue};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_TERRAFORM_VERSION: &str = "1.9.0";

pub struct PlanResourceResponse {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ApplyResourceResponse {
    pub new_state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ProviderHost<P: Provider> {
    provider: P,
    terraform_version: String,
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
    configured: bool,
    resources: HashMap<String, ResourceFactory>,
    data_sources: HashMap<String, DataSourceFactory>,
}

impl<P: Provider> ProviderHost<P> {
    pub fn new(provider: P) -> Self {
        let resources = provider.resources();
        let data_sources = provider.data_sources();
        Self {
            provider,
            terraform_version: DEFAULT_TERRAFORM_VERSION.to_string(),
            provider_data: None,
            configured: false,
            resources,
            data_sources,
        }
    }

    pub fn with_terraform_version(mut self, version: &str) -> Self {
        self.terraform_version = version.to_string();
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn resource_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn data_source_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.data_sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validate the provider block and configure the provider
    pub async fn configure(&mut self, ctx: Context, config: DynamicValue) -> Vec<Diagnostic> {
        let schema = self
            .provider
            .schema(ctx.clone(), ProviderSchemaRequest)
            .await;
        let mut diagnostics = schema.diagnostics;
        diagnostics.extend(schema.schema.validate(&config));
        if has_errors(&diagnostics) {
            return diagnostics;
        }

        let validated = self
            .provider
            .validate(
                ctx.clone(),
                ValidateProviderConfigRequest {
                    config: config.clone(),
                },
            )
            .await;
        diagnostics.extend(validated.diagnostics);
        if has_errors(&diagnostics) {
            return diagnostics;
        }

        debug!(provider = self.provider.type_name(), "configuring provider");
        let response = self
            .provider
            .configure(
                ctx,
                ConfigureProviderRequest {
                    terraform_version: self.terraform_version.clone(),
                    config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        if !has_errors(&diagnostics) {
            self.provider_data = response.provider_data;
            self.configured = true;
        }
        diagnostics
    }

    pub async fn resource_schema(&self, ctx: Context, type_name: &str) -> Result<Schema, Vec<Diagnostic>> {
        let resource = self.resource(ctx.clone(), type_name).await?;
        let response = resource.schema(ctx, ResourceSchemaRequest).await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(response.schema)
    }

    pub async fn data_source_schema(
        &self,
        ctx: Context,
        type_name: &str,
    ) -> Result<Schema, Vec<Diagnostic>> {
        let data_source = self.data_source(ctx.clone(), type_name).await?;
        let response = data_source.schema(ctx, DataSourceSchemaRequest).await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(response.schema)
    }

    /// Validate the configuration and compute the planned state
    pub async fn plan_resource(
        &self,
        ctx: Context,
        type_name: &str,
        prior_state: &DynamicValue,
        config: &DynamicValue,
    ) -> PlanResourceResponse {
        let mut response = PlanResourceResponse {
            planned_state: DynamicValue::null(),
            requires_replace: vec![],
            diagnostics: vec![],
        };

        let resource = match self.resource(ctx.clone(), type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                response.diagnostics = diagnostics;
                return response;
            }
        };

        let schema = resource.schema(ctx.clone(), ResourceSchemaRequest).await;
        response.diagnostics.extend(schema.diagnostics);

        if !config.is_null() {
            response.diagnostics.extend(schema.schema.validate(config));
            let validated = resource
                .validate(
                    ctx.clone(),
                    ValidateResourceConfigRequest {
                        type_name: type_name.to_string(),
                        config: config.clone(),
                        client_capabilities: ClientCapabilities::default(),
                    },
                )
                .await;
            response.diagnostics.extend(validated.diagnostics);
        }
        if has_errors(&response.diagnostics) {
            return response;
        }

        debug!(type_name, "planning resource change");
        let plan = schema.schema.plan(prior_state, config);
        response.planned_state = plan.planned_state;
        response.requires_replace = plan.requires_replace;
        response.diagnostics.extend(plan.diagnostics);
        response
    }

    /// Create, update or delete depending on which side of the change is null
    pub async fn apply_resource(
        &self,
        ctx: Context,
        type_name: &str,
        prior_state: DynamicValue,
        planned_state: DynamicValue,
        config: DynamicValue,
    ) -> ApplyResourceResponse {
        let resource = match self.resource(ctx.clone(), type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ApplyResourceResponse {
                    new_state: prior_state,
                    diagnostics,
                }
            }
        };

        if planned_state.is_null() {
            if prior_state.is_null() {
                return ApplyResourceResponse {
                    new_state: DynamicValue::null(),
                    diagnostics: vec![],
                };
            }

            debug!(type_name, "deleting resource");
            let response = resource
                .delete(
                    ctx,
                    DeleteResourceRequest {
                        type_name: type_name.to_string(),
                        prior_state: prior_state.clone(),
                    },
                )
                .await;
            let new_state = if has_errors(&response.diagnostics) {
                prior_state
            } else {
                DynamicValue::null()
            };
            return ApplyResourceResponse {
                new_state,
                diagnostics: response.diagnostics,
            };
        }

        let (new_state, mut diagnostics) = if prior_state.is_null() {
            debug!(type_name, "creating resource");
            let response = resource
                .create(
                    ctx,
                    CreateResourceRequest {
                        type_name: type_name.to_string(),
                        planned_state,
                        config,
                    },
                )
                .await;
            (response.new_state, response.diagnostics)
        } else {
            debug!(type_name, "updating resource");
            let response = resource
                .update(
                    ctx,
                    UpdateResourceRequest {
                        type_name: type_name.to_string(),
                        prior_state,
                        planned_state,
                        config,
                    },
                )
                .await;
            (response.new_state, response.diagnostics)
        };

        if !has_errors(&diagnostics) && !new_state.value.is_fully_known() {
            diagnostics.push(Diagnostic::error(
                "Provider returned invalid result object after apply",
                format!(
                    "After applying changes to {}, the new state still contains unknown values.",
                    type_name
                ),
            ));
        }

        ApplyResourceResponse {
            new_state,
            diagnostics,
        }
    }

    /// Refresh the state from the remote API; None means the object is gone
    pub async fn read_resource(
        &self,
        ctx: Context,
        type_name: &str,
        current_state: DynamicValue,
    ) -> ReadResourceResponse {
        let resource = match self.resource(ctx.clone(), type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ReadResourceResponse {
                    new_state: Some(current_state),
                    diagnostics,
                }
            }
        };

        debug!(type_name, "reading resource");
        resource
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: type_name.to_string(),
                    current_state,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await
    }

    /// Import by ID, then read each imported object to complete its state
    pub async fn import_resource(
        &self,
        ctx: Context,
        type_name: &str,
        id: &str,
    ) -> ImportResourceStateResponse {
        let mut result = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };

        let resource = match self.resource(ctx.clone(), type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                result.diagnostics = diagnostics;
                return result;
            }
        };

        let Some(importer) = resource.as_import_state() else {
            result.diagnostics.push(Diagnostic::error(
                "Resource Import Not Implemented",
                TfplugError::ImportNotSupported(type_name.to_string()).to_string(),
            ));
            return result;
        };

        debug!(type_name, id, "importing resource");
        let imported = importer
            .import_state(
                ctx.clone(),
                ImportResourceStateRequest {
                    type_name: type_name.to_string(),
                    id: id.to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        result.diagnostics.extend(imported.diagnostics);
        if has_errors(&result.diagnostics) {
            return result;
        }

        for partial in imported.imported_resources {
            let read = resource
                .read(
                    ctx.clone(),
                    ReadResourceRequest {
                        type_name: partial.type_name.clone(),
                        current_state: partial.state,
                        client_capabilities: ClientCapabilities::default(),
                    },
                )
                .await;
            result.diagnostics.extend(read.diagnostics);

            match read.new_state {
                Some(state) if !state.is_null() => result.imported_resources.push(ImportedResource {
                    type_name: partial.type_name,
                    state,
                }),
                _ => result.diagnostics.push(Diagnostic::error(
                    "Cannot import non-existent remote object",
                    format!("No {} with ID {:?} exists", type_name, id),
                )),
            }
        }
        result
    }

    pub async fn read_data_source(
        &self,
        ctx: Context,
        type_name: &str,
        config: DynamicValue,
    ) -> ReadDataSourceResponse {
        let mut diagnostics = vec![];
        let data_source = match self.data_source(ctx.clone(), type_name).await {
            Ok(data_source) => data_source,
            Err(diags) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: diags,
                }
            }
        };

        let schema = data_source.schema(ctx.clone(), DataSourceSchemaRequest).await;
        diagnostics.extend(schema.diagnostics);
        diagnostics.extend(schema.schema.validate(&config));
        let validated = data_source
            .validate(
                ctx.clone(),
                ValidateDataSourceConfigRequest {
                    type_name: type_name.to_string(),
                    config: config.clone(),
                },
            )
            .await;
        diagnostics.extend(validated.diagnostics);
        if has_errors(&diagnostics) {
            return ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics,
            };
        }

        debug!(type_name, "reading data source");
        let mut response = data_source
            .read(
                ctx,
                ReadDataSourceRequest {
                    type_name: type_name.to_string(),
                    config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        diagnostics.append(&mut response.diagnostics);
        response.diagnostics = diagnostics;
        response
    }

    async fn resource(
        &self,
        ctx: Context,
        type_name: &str,
    ) -> Result<Box<dyn ResourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self.resources.get(type_name).ok_or_else(|| {
            vec![Diagnostic::error(
                "Unknown resource type",
                TfplugError::ResourceNotFound(type_name.to_string()).to_string(),
            )]
        })?;

        let mut resource = factory();
        let response = resource
            .configure(
                ctx,
                ConfigureResourceRequest {
                    provider_data: self.provider_data.clone(),
                },
            )
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(resource)
    }

    async fn data_source(
        &self,
        ctx: Context,
        type_name: &str,
    ) -> Result<Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self.data_sources.get(type_name).ok_or_else(|| {
            vec![Diagnostic::error(
                "Unknown data source type",
                TfplugError::DataSourceNotFound(type_name.to_string()).to_string(),
            )]
        })?;

        let mut data_source = factory();
        let response = data_source
            .configure(
                ctx,
                ConfigureDataSourceRequest {
                    provider_data: self.provider_data.clone(),
                },
            )
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(data_source)
    }
}
