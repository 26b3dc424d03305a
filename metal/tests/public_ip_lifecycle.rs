//! Public IP create, list and delete through ProviderHost against a mock API

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use metal::config::ENV_CONFIG;
use metal::MetalProvider;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};
use tfplug::context::Context;
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::{try_init_logging, LogLevel, ProviderHost};

const PROJECT: &str = "0a3bd9c6-9e45-4d3b-9a3f-7b3b54e02a41";

fn token() -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES512","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(json!({"sub": "ci@github", "type": "api-token"}).to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, body)
}

fn existing_ip() -> Value {
    json!({
        "uuid": "7b1a0c2e-3f4d-4e5f-8a9b-0c1d2e3f4a5b",
        "ip": "212.34.83.10",
        "name": "existing",
        "network": "internet",
        "project": PROJECT,
        "type": "IP_TYPE_STATIC",
        "createdAt": "2024-02-08T08:48:20Z",
        "updatedAt": "2024-02-08T08:48:20Z"
    })
}

fn allocated_ip() -> Value {
    json!({
        "uuid": "c9e2d9f0-1a2b-4c3d-8e4f-5a6b7c8d9e0f",
        "ip": "212.34.83.11",
        "name": "ingress",
        "description": "",
        "network": "internet",
        "project": PROJECT,
        "type": "IP_TYPE_EPHEMERAL",
        "tags": [],
        "createdAt": "2024-03-01T10:00:00Z",
        "updatedAt": "2024-03-01T10:00:00Z"
    })
}

async fn mock_list(server: &mut ServerGuard, ips: Vec<Value>) -> Mock {
    server
        .mock("POST", "/api.v1.IPService/List")
        .match_body(Matcher::Json(json!({"project": PROJECT})))
        .with_body(json!({"ips": ips}).to_string())
        .create_async()
        .await
}

async fn count_ips(host: &ProviderHost<MetalProvider>) -> usize {
    let response = host
        .read_data_source(Context::new(), "metal_public_ips", DynamicValue::empty_object())
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    response
        .state
        .get_list(&AttributePath::new("items"))
        .map(|items| items.len())
        .unwrap_or_default()
}

#[tokio::test]
async fn create_and_delete_changes_list_count() {
    try_init_logging(LogLevel::Debug);
    std::env::set_var(ENV_CONFIG, "/dev/null");
    let mut server = Server::new_async().await;
    let ctx = Context::new();

    let mut host = ProviderHost::new(MetalProvider::new());
    let mut provider_config = DynamicValue::empty_object();
    let _ = provider_config.set_string(&AttributePath::new("api_token"), token());
    let _ = provider_config.set_string(&AttributePath::new("api_url"), server.url());
    let _ = provider_config.set_string(&AttributePath::new("project"), PROJECT);
    let _ = provider_config.set_string(&AttributePath::new("organization"), "acme");
    let diagnostics = host.configure(ctx.clone(), provider_config).await;
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    let list = mock_list(&mut server, vec![existing_ip()]).await;
    let before = count_ips(&host).await;
    assert_eq!(before, 1);
    list.remove_async().await;

    let allocate = server
        .mock("POST", "/api.v1.IPService/Allocate")
        .match_header("authorization", Matcher::Regex("^Bearer ".to_string()))
        .match_body(Matcher::PartialJson(json!({
            "project": PROJECT,
            "name": "ingress",
            "static": false
        })))
        .with_body(json!({"ip": allocated_ip()}).to_string())
        .create_async()
        .await;

    let mut config = DynamicValue::empty_object();
    let _ = config.set_string(&AttributePath::new("name"), "ingress");

    let plan = host
        .plan_resource(ctx.clone(), "metal_public_ip", &DynamicValue::null(), &config)
        .await;
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);
    assert_eq!(
        plan.planned_state.get_string(&AttributePath::new("type")).unwrap(),
        "ephemeral"
    );
    assert!(plan
        .planned_state
        .get(&AttributePath::new("ip"))
        .is_some_and(Dynamic::is_unknown));

    let applied = host
        .apply_resource(
            ctx.clone(),
            "metal_public_ip",
            DynamicValue::null(),
            plan.planned_state,
            config,
        )
        .await;
    allocate.assert_async().await;
    assert!(applied.diagnostics.is_empty(), "{:?}", applied.diagnostics);
    let state = applied.new_state;
    assert_eq!(
        state.get_string(&AttributePath::new("ip")).unwrap(),
        "212.34.83.11"
    );

    let list = mock_list(&mut server, vec![existing_ip(), allocated_ip()]).await;
    assert_eq!(count_ips(&host).await, before + 1);
    list.remove_async().await;

    let delete = server
        .mock("POST", "/api.v1.IPService/Delete")
        .match_body(Matcher::Json(json!({
            "uuid": "c9e2d9f0-1a2b-4c3d-8e4f-5a6b7c8d9e0f",
            "project": PROJECT
        })))
        .with_body(json!({"ip": allocated_ip()}).to_string())
        .create_async()
        .await;

    let destroyed = host
        .apply_resource(
            ctx.clone(),
            "metal_public_ip",
            state,
            DynamicValue::null(),
            DynamicValue::null(),
        )
        .await;
    delete.assert_async().await;
    assert!(destroyed.diagnostics.is_empty(), "{:?}", destroyed.diagnostics);
    assert!(destroyed.new_state.is_null());

    let _list = mock_list(&mut server, vec![existing_ip()]).await;
    assert_eq!(count_ips(&host).await, before);

    std::env::remove_var(ENV_CONFIG);
}
