//! Plan/apply/read/import through ProviderHost with an in-memory resource

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceFactory,
    DataSourceMetadataRequest, DataSourceMetadataResponse, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, Provider, ProviderMetaSchemaRequest,
    ProviderMetaSchemaResponse, ProviderMetadataRequest, ProviderMetadataResponse,
    ProviderSchemaRequest, ProviderSchemaResponse, StopProviderRequest, StopProviderResponse,
    ValidateProviderConfigRequest, ValidateProviderConfigResponse,
};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceFactory, ResourceMetadataRequest,
    ResourceMetadataResponse, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue, ServerCapabilities};
use tfplug::{import_state_passthrough_id, ProviderHost};

#[derive(Default)]
struct Store {
    items: Mutex<HashMap<String, HashMap<String, Dynamic>>>,
    next_id: AtomicUsize,
}

struct MemoryProvider {
    store: Arc<Store>,
}

#[async_trait]
impl Provider for MemoryProvider {
    fn type_name(&self) -> &str {
        "memory"
    }

    async fn metadata(&self, _ctx: Context, _r: ProviderMetadataRequest) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: "memory".to_string(),
            server_capabilities: ServerCapabilities::default(),
        }
    }

    async fn schema(&self, _ctx: Context, _r: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(
                    AttributeBuilder::new("token", AttributeType::String)
                        .required()
                        .sensitive()
                        .build(),
                )
                .build(),
            diagnostics: vec![],
        }
    }

    async fn meta_schema(
        &self,
        _ctx: Context,
        _r: ProviderMetaSchemaRequest,
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
        let token = request
            .config
            .get_string(&AttributePath::new("token"))
            .unwrap_or_default();
        if token != "secret" {
            return ConfigureProviderResponse {
                diagnostics: vec![Diagnostic::error("Invalid token", "token rejected")
                    .with_attribute(AttributePath::new("token"))],
                provider_data: None,
            };
        }
        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(self.store.clone() as Arc<dyn Any + Send + Sync>),
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _r: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        ValidateProviderConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn stop(&self, _ctx: Context, _r: StopProviderRequest) -> StopProviderResponse {
        StopProviderResponse { error: None }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "memory_item".to_string(),
            Box::new(|| Box::new(ItemResource { store: None }) as Box<dyn ResourceWithConfigure>),
        );
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert(
            "memory_items".to_string(),
            Box::new(|| {
                Box::new(ItemsDataSource { store: None }) as Box<dyn DataSourceWithConfigure>
            }),
        );
        factories
    }
}

struct ItemResource {
    store: Option<Arc<Store>>,
}

impl ItemResource {
    fn store(&self) -> Result<&Arc<Store>, Diagnostic> {
        self.store
            .as_ref()
            .ok_or_else(|| Diagnostic::error("Unconfigured provider", "no store"))
    }
}

fn item_state(id: &str, fields: &HashMap<String, Dynamic>) -> DynamicValue {
    let mut object = fields.clone();
    object.insert("id".to_string(), Dynamic::String(id.to_string()));
    DynamicValue::new(Dynamic::Map(object))
}

fn fields_from(plan: &DynamicValue) -> HashMap<String, Dynamic> {
    let mut fields = plan.value.as_map().cloned().unwrap_or_default();
    fields.remove("id");
    fields
}

#[async_trait]
impl Resource for ItemResource {
    fn type_name(&self) -> &str {
        "memory_item"
    }

    async fn metadata(&self, _ctx: Context, _r: ResourceMetadataRequest) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: "memory_item".to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _r: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(
                    AttributeBuilder::new("id", AttributeType::String)
                        .computed()
                        .plan_modifier(Box::new(UseStateForUnknown))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("name", AttributeType::String)
                        .required()
                        .plan_modifier(Box::new(RequiresReplaceIfChanged))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("size", AttributeType::Number)
                        .optional()
                        .computed()
                        .default(StaticDefault::number(1.0))
                        .build(),
                )
                .build(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];
        if let Ok(size) = request.config.get_number(&AttributePath::new("size")) {
            if size < 0.0 {
                diagnostics.push(
                    Diagnostic::error("Invalid size", "size must not be negative")
                        .with_attribute(AttributePath::new("size")),
                );
            }
        }
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let store = match self.store() {
            Ok(store) => store,
            Err(d) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![d],
                }
            }
        };
        let id = format!("item-{}", store.next_id.fetch_add(1, Ordering::SeqCst));
        let fields = fields_from(&request.planned_state);
        store
            .items
            .lock()
            .unwrap()
            .insert(id.clone(), fields.clone());
        CreateResourceResponse {
            new_state: item_state(&id, &fields),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let store = self.store().unwrap();
        let id = request
            .current_state
            .get_string(&AttributePath::new("id"))
            .unwrap_or_default();
        let items = store.items.lock().unwrap();
        ReadResourceResponse {
            new_state: items.get(&id).map(|fields| item_state(&id, fields)),
            diagnostics: vec![],
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let store = self.store().unwrap();
        let id = request
            .prior_state
            .get_string(&AttributePath::new("id"))
            .unwrap();
        let fields = fields_from(&request.planned_state);
        store.items.lock().unwrap().insert(id.clone(), fields.clone());
        UpdateResourceResponse {
            new_state: item_state(&id, &fields),
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let store = self.store().unwrap();
        let id = request
            .prior_state
            .get_string(&AttributePath::new("id"))
            .unwrap();
        store.items.lock().unwrap().remove(&id);
        DeleteResourceResponse {
            diagnostics: vec![],
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for ItemResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        self.store = request
            .provider_data
            .and_then(|data| data.downcast::<Store>().ok());
        ConfigureResourceResponse {
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithImportState for ItemResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

struct ItemsDataSource {
    store: Option<Arc<Store>>,
}

#[async_trait]
impl DataSource for ItemsDataSource {
    fn type_name(&self) -> &str {
        "memory_items"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _r: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: "memory_items".to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _r: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(
                    AttributeBuilder::new("names", AttributeType::List(Box::new(AttributeType::String)))
                        .computed()
                        .build(),
                )
                .build(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _r: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, _r: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let store = self.store.as_ref().unwrap();
        let mut names: Vec<String> = store
            .items
            .lock()
            .unwrap()
            .values()
            .filter_map(|fields| fields.get("name").and_then(|n| n.as_str()).map(String::from))
            .collect();
        names.sort();
        ReadDataSourceResponse {
            state: DynamicValue::new(Dynamic::object([("names", Dynamic::from(names))])),
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ItemsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        self.store = request
            .provider_data
            .and_then(|data| data.downcast::<Store>().ok());
        ConfigureDataSourceResponse {
            diagnostics: vec![],
        }
    }
}

fn config(name: &str) -> DynamicValue {
    DynamicValue::new(Dynamic::object([("name", Dynamic::from(name))]))
}

async fn configured_host() -> (ProviderHost<MemoryProvider>, Arc<Store>) {
    let store = Arc::new(Store::default());
    let mut host = ProviderHost::new(MemoryProvider {
        store: store.clone(),
    });
    let diagnostics = host
        .configure(
            Context::new(),
            DynamicValue::new(Dynamic::object([("token", Dynamic::from("secret"))])),
        )
        .await;
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    (host, store)
}

#[tokio::test]
async fn configure_requires_token() {
    let mut host = ProviderHost::new(MemoryProvider {
        store: Arc::new(Store::default()),
    });

    let diagnostics = host.configure(Context::new(), DynamicValue::empty_object()).await;
    assert_eq!(diagnostics[0].summary, "Missing required argument");
    assert!(!host.is_configured());

    let diagnostics = host
        .configure(
            Context::new(),
            DynamicValue::new(Dynamic::object([("token", Dynamic::from("wrong"))])),
        )
        .await;
    assert_eq!(diagnostics[0].summary, "Invalid token");
    assert!(!host.is_configured());
}

#[tokio::test]
async fn create_update_replace_and_destroy() {
    let (host, store) = configured_host().await;
    let ctx = Context::new();

    let plan = host
        .plan_resource(ctx.clone(), "memory_item", &DynamicValue::null(), &config("alpha"))
        .await;
    assert!(plan.diagnostics.is_empty());
    assert!(plan.requires_replace.is_empty());
    assert_eq!(plan.planned_state.value.get("id"), Some(&Dynamic::Unknown));
    assert_eq!(plan.planned_state.value.get("size"), Some(&Dynamic::Number(1.0)));

    let applied = host
        .apply_resource(
            ctx.clone(),
            "memory_item",
            DynamicValue::null(),
            plan.planned_state,
            config("alpha"),
        )
        .await;
    assert!(applied.diagnostics.is_empty(), "{:?}", applied.diagnostics);
    let state = applied.new_state;
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "item-0");

    // no change keeps the id
    let plan = host
        .plan_resource(ctx.clone(), "memory_item", &state, &config("alpha"))
        .await;
    assert_eq!(plan.planned_state, state);

    // renaming forces replacement
    let plan = host
        .plan_resource(ctx.clone(), "memory_item", &state, &config("beta"))
        .await;
    assert_eq!(plan.requires_replace, vec![AttributePath::new("name")]);
    assert_eq!(
        plan.planned_state.get_string(&AttributePath::new("id")).unwrap(),
        "item-0"
    );

    let updated = host
        .apply_resource(
            ctx.clone(),
            "memory_item",
            state.clone(),
            plan.planned_state,
            config("beta"),
        )
        .await;
    assert_eq!(
        updated.new_state.get_string(&AttributePath::new("name")).unwrap(),
        "beta"
    );

    let destroy = host
        .plan_resource(ctx.clone(), "memory_item", &updated.new_state, &DynamicValue::null())
        .await;
    assert!(destroy.planned_state.is_null());

    let deleted = host
        .apply_resource(
            ctx,
            "memory_item",
            updated.new_state,
            destroy.planned_state,
            DynamicValue::null(),
        )
        .await;
    assert!(deleted.diagnostics.is_empty());
    assert!(deleted.new_state.is_null());
    assert!(store.items.lock().unwrap().is_empty());
}

#[tokio::test]
async fn plan_reports_validation_errors() {
    let (host, _) = configured_host().await;

    let bad = DynamicValue::new(Dynamic::object([
        ("name", Dynamic::from("alpha")),
        ("size", Dynamic::Number(-1.0)),
    ]));
    let plan = host
        .plan_resource(Context::new(), "memory_item", &DynamicValue::null(), &bad)
        .await;
    assert_eq!(plan.diagnostics.len(), 1);
    assert_eq!(plan.diagnostics[0].attribute, Some(AttributePath::new("size")));
    assert!(plan.planned_state.is_null());

    let unknown = host
        .plan_resource(Context::new(), "memory_nothing", &DynamicValue::null(), &config("a"))
        .await;
    assert_eq!(unknown.diagnostics[0].summary, "Unknown resource type");
}

#[tokio::test]
async fn read_reports_removed_objects() {
    let (host, store) = configured_host().await;
    let ctx = Context::new();

    let plan = host
        .plan_resource(ctx.clone(), "memory_item", &DynamicValue::null(), &config("alpha"))
        .await;
    let state = host
        .apply_resource(
            ctx.clone(),
            "memory_item",
            DynamicValue::null(),
            plan.planned_state,
            config("alpha"),
        )
        .await
        .new_state;

    let read = host.read_resource(ctx.clone(), "memory_item", state.clone()).await;
    assert_eq!(read.new_state, Some(state.clone()));

    store.items.lock().unwrap().clear();
    let read = host.read_resource(ctx, "memory_item", state).await;
    assert!(read.new_state.is_none());
}

#[tokio::test]
async fn import_reads_full_state() {
    let (host, store) = configured_host().await;
    store.items.lock().unwrap().insert(
        "item-7".to_string(),
        HashMap::from([
            ("name".to_string(), Dynamic::from("imported")),
            ("size".to_string(), Dynamic::Number(3.0)),
        ]),
    );

    let imported = host
        .import_resource(Context::new(), "memory_item", "item-7")
        .await;
    assert!(imported.diagnostics.is_empty());
    assert_eq!(imported.imported_resources.len(), 1);
    assert_eq!(
        imported.imported_resources[0]
            .state
            .get_string(&AttributePath::new("name"))
            .unwrap(),
        "imported"
    );

    let missing = host
        .import_resource(Context::new(), "memory_item", "item-9")
        .await;
    assert_eq!(
        missing.diagnostics[0].summary,
        "Cannot import non-existent remote object"
    );
}

#[tokio::test]
async fn data_source_reads_store() {
    let (host, store) = configured_host().await;
    store.items.lock().unwrap().insert(
        "a".to_string(),
        HashMap::from([("name".to_string(), Dynamic::from("zeta"))]),
    );
    store.items.lock().unwrap().insert(
        "b".to_string(),
        HashMap::from([("name".to_string(), Dynamic::from("alpha"))]),
    );

    let read = host
        .read_data_source(Context::new(), "memory_items", DynamicValue::empty_object())
        .await;
    assert!(read.diagnostics.is_empty());
    assert_eq!(
        read.state.get_list(&AttributePath::new("names")).unwrap(),
        vec![Dynamic::from("alpha"), Dynamic::from("zeta")]
    );
    assert_eq!(host.data_source_types(), vec!["memory_items"]);
    assert_eq!(host.resource_types(), vec!["memory_item"]);
}

#[test]
fn host_drives_without_async_test_harness() {
    let (host, _) = tokio_test::block_on(configured_host());
    assert!(host.is_configured());
}
