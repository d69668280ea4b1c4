use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use opizontas_directory::runtime::runtime_routes;
use opizontas_directory::services::health::HealthCheckResult;
use opizontas_directory::services::{ServiceContext, dependency_gate};

fn context() -> Arc<ServiceContext> {
    Arc::new(ServiceContext::new("Business", vec!["Logging".to_string()]))
}

fn notification(action: &str, service_type: &str, port: u16) -> Value {
    json!({
        "action": action,
        "registration": {
            "id": format!("{service_type}-{port}"),
            "serviceType": service_type,
            "ip": "10.0.0.5",
            "port": port,
            "requiredServices": [],
            "notificationEndpoint": format!("http://10.0.0.5:{port}/notify"),
            "healthCheckEndpoint": format!("http://10.0.0.5:{port}/healthcheck"),
        }
    })
}

async fn call(app: &Router, method: Method, uri: &str, body: Body) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn test_notify_endpoint_updates_cache() {
    let ctx = context();
    let app = runtime_routes(ctx.clone());

    let (status, body) = call(
        &app,
        Method::POST,
        "/notify",
        Body::from(notification("register", "Logging", 8081).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"Notification handled successfully");

    let cached = ctx.cache().get("Logging").unwrap();
    assert_eq!(cached.id, "Logging-8081");
    assert_eq!(cached.base_url(), "http://10.0.0.5:8081");

    // 依赖已连接时不覆盖，非依赖类型不建条目
    let (status, _) = call(
        &app,
        Method::POST,
        "/notify",
        Body::from(notification("register", "Metrics", 9000).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!ctx.cache().contains("Metrics"));

    let (status, _) = call(
        &app,
        Method::POST,
        "/notify",
        Body::from(notification("deregister", "Logging", 8081).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(ctx.cache().is_empty());
}

#[tokio::test]
async fn test_notify_endpoint_rejects_bad_payload() {
    let ctx = context();
    let app = runtime_routes(ctx.clone());

    let (status, body) = call(&app, Method::POST, "/notify", Body::from("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"failed to decode notification payload");

    let (status, _) = call(
        &app,
        Method::POST,
        "/notify",
        Body::from(notification("restart", "Logging", 8081).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(ctx.cache().is_empty());
}

#[tokio::test]
async fn test_healthcheck_endpoint_reports_self() {
    let ctx = context();
    ctx.set_registration_id("self-id".to_string()).await;
    let app = runtime_routes(ctx);

    let (status, body) = call(&app, Method::GET, "/healthcheck", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);

    let report: HealthCheckResult = serde_json::from_slice(&body).unwrap();
    assert_eq!(report.service_id, "self-id");
    assert_eq!(report.service_type, "Business");
    assert!(report.healthy);
    assert_eq!(report.message, "Service is healthy");
}

#[tokio::test]
async fn test_dependency_gate_until_connected() {
    let ctx = context();
    let business = Router::new()
        .route("/orders", get(|| async { "orders" }))
        .layer(from_fn_with_state(ctx.clone(), dependency_gate));
    let app = business.merge(runtime_routes(ctx.clone()));

    let (status, body) = call(&app, Method::GET, "/orders", Body::empty()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(String::from_utf8_lossy(&body).contains("Logging"));
    assert_eq!(ctx.missing_dependencies(), vec!["Logging".to_string()]);
    assert!(ctx.require_dependency("Logging").is_err());

    call(
        &app,
        Method::POST,
        "/notify",
        Body::from(notification("register", "Logging", 8081).to_string()),
    )
    .await;

    let (status, body) = call(&app, Method::GET, "/orders", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"orders");
    assert!(ctx.is_ready());
    assert_eq!(ctx.require_dependency("Logging").unwrap().port, 8081);
}

#[tokio::test]
async fn test_registration_id_lifecycle() {
    let ctx = context();
    assert!(ctx.registration_id().await.is_none());

    ctx.set_endpoint(
        "127.0.0.1",
        9100,
        "http://127.0.0.1:9100/notify".to_string(),
        "http://127.0.0.1:9100/healthcheck".to_string(),
    )
    .await;
    ctx.set_registration_id("abc".to_string()).await;

    let record = ctx.registration_record().await;
    assert_eq!(record.id, "abc");
    assert_eq!(record.port, 9100);
    assert_eq!(record.required_services, vec!["Logging".to_string()]);

    ctx.clear_registration_id().await;
    assert!(ctx.registration_id().await.is_none());
}
