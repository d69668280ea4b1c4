use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opizontas_directory::services::connection::{
    ConnectedInstance, ConnectedInstanceCache, NotificationOutcome, apply_notification,
};
use opizontas_directory::services::notification::{
    HttpNotificationSender, NotificationAction, NotificationError, NotificationPayload,
    NotificationSender, Notifier,
};
use opizontas_directory::services::registry::{RegistrationRecord, ServiceRegistry};

// 记录所有投递的测试替身，可指定失败的地址
#[derive(Debug, Default)]
struct RecordingSender {
    deliveries: Mutex<Vec<(String, NotificationPayload)>>,
    failing: HashSet<String>,
}

impl RecordingSender {
    fn failing_on(endpoints: &[&str]) -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            failing: endpoints.iter().map(|e| e.to_string()).collect(),
        }
    }

    fn endpoints(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn deliver(
        &self,
        endpoint: &str,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        self.deliveries
            .lock()
            .unwrap()
            .push((endpoint.to_string(), payload.clone()));

        if self.failing.contains(endpoint) {
            return Err(NotificationError::Rejected {
                endpoint: endpoint.to_string(),
                status: 503,
            });
        }
        Ok(())
    }
}

fn record(service_type: &str, port: u16, required: &[&str]) -> RegistrationRecord {
    RegistrationRecord {
        id: String::new(),
        service_type: service_type.to_string(),
        ip: "127.0.0.1".to_string(),
        port,
        required_services: required.iter().map(|s| s.to_string()).collect(),
        notification_endpoint: format!("http://svc-{port}/notify"),
        health_check_endpoint: format!("http://svc-{port}/healthcheck"),
    }
}

#[tokio::test]
async fn test_fan_out_reaches_only_dependents() {
    let registry = ServiceRegistry::new();
    registry.register(record("Business", 8082, &["Logging"])).await.unwrap();
    registry.register(record("Audit", 8084, &["Logging", "Metrics"])).await.unwrap();
    registry.register(record("Reports", 8085, &["Metrics"])).await.unwrap();
    let logging = registry.register(record("Logging", 8081, &[])).await.unwrap();

    let sender = Arc::new(RecordingSender::default());
    let notifier = Notifier::new(registry.clone(), sender.clone());

    let report = notifier
        .fan_out(NotificationAction::Register, &logging)
        .await
        .expect("fan-out failed");

    assert_eq!(report.attempted, 2);
    assert_eq!(report.delivered, 2);
    assert!(report.is_complete());

    // 按 find_dependents 的顺序投递
    assert_eq!(
        sender.endpoints(),
        vec!["http://svc-8082/notify", "http://svc-8084/notify"]
    );

    let deliveries = sender.deliveries.lock().unwrap();
    for (_, payload) in deliveries.iter() {
        assert_eq!(payload.action, NotificationAction::Register);
        assert_eq!(payload.registration, logging);
    }
}

#[tokio::test]
async fn test_fan_out_without_dependents() {
    let registry = ServiceRegistry::new();
    let logging = registry.register(record("Logging", 8081, &[])).await.unwrap();

    let sender = Arc::new(RecordingSender::default());
    let notifier = Notifier::new(registry, sender.clone());

    let report = notifier
        .fan_out(NotificationAction::Register, &logging)
        .await
        .unwrap();

    assert_eq!(report.attempted, 0);
    assert!(sender.endpoints().is_empty());
}

#[tokio::test]
async fn test_best_effort_continues_after_failure() {
    let registry = ServiceRegistry::new();
    registry.register(record("A", 9001, &["Logging"])).await.unwrap();
    registry.register(record("B", 9002, &["Logging"])).await.unwrap();
    registry.register(record("C", 9003, &["Logging"])).await.unwrap();
    let logging = registry.register(record("Logging", 8081, &[])).await.unwrap();

    let sender = Arc::new(RecordingSender::failing_on(&["http://svc-9002/notify"]));
    let notifier = Notifier::new(registry, sender.clone());

    let report = notifier
        .fan_out(NotificationAction::Register, &logging)
        .await
        .expect("best-effort fan-out must not fail");

    assert_eq!(report.attempted, 3);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].endpoint, "http://svc-9002/notify");
    assert_eq!(sender.endpoints().len(), 3);
}

#[tokio::test]
async fn test_strict_policy_stops_at_first_failure() {
    let registry = ServiceRegistry::new();
    registry.register(record("A", 9001, &["Logging"])).await.unwrap();
    registry.register(record("B", 9002, &["Logging"])).await.unwrap();
    registry.register(record("C", 9003, &["Logging"])).await.unwrap();
    let logging = registry.register(record("Logging", 8081, &[])).await.unwrap();

    let sender = Arc::new(RecordingSender::failing_on(&["http://svc-9002/notify"]));
    let notifier = Notifier::new(registry, sender.clone()).with_fail_on_error(true);

    let result = notifier
        .fan_out(NotificationAction::Register, &logging)
        .await;

    assert!(matches!(
        result,
        Err(NotificationError::Rejected { status: 503, .. })
    ));
    assert_eq!(
        sender.endpoints(),
        vec!["http://svc-9001/notify", "http://svc-9002/notify"]
    );
}

// 永不返回的投递目标
#[derive(Debug, Default)]
struct HangingSender {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationSender for HangingSender {
    async fn deliver(
        &self,
        endpoint: &str,
        _payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        self.calls.lock().unwrap().push(endpoint.to_string());
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn test_fan_out_bounded_by_deadline() {
    let registry = ServiceRegistry::new();
    registry.register(record("A", 9001, &["Logging"])).await.unwrap();
    registry.register(record("B", 9002, &["Logging"])).await.unwrap();
    let logging = registry.register(record("Logging", 8081, &[])).await.unwrap();

    let sender = Arc::new(HangingSender::default());
    let notifier =
        Notifier::new(registry, sender.clone()).with_deadline(Duration::from_millis(200));

    let started = std::time::Instant::now();
    let report = notifier
        .fan_out(NotificationAction::Register, &logging)
        .await
        .expect("best-effort fan-out must not fail");

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.attempted, 2);
    assert_eq!(report.delivered, 0);
    // 卡住的目标与未投递的目标都记为失败
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[1].endpoint, "http://svc-9002/notify");
    assert_eq!(sender.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_strict_fan_out_deadline_is_error() {
    let registry = ServiceRegistry::new();
    registry.register(record("A", 9001, &["Logging"])).await.unwrap();
    let logging = registry.register(record("Logging", 8081, &[])).await.unwrap();

    let notifier = Notifier::new(registry, Arc::new(HangingSender::default()))
        .with_fail_on_error(true)
        .with_deadline(Duration::from_millis(100));

    let result = notifier
        .fan_out(NotificationAction::Register, &logging)
        .await;
    assert!(matches!(
        result,
        Err(NotificationError::DeadlineExceeded { deadline_ms: 100 })
    ));
}

#[tokio::test]
async fn test_http_sender_posts_payload() {
    let mock_server = MockServer::start().await;
    let announced = RegistrationRecord {
        id: "logging-1".to_string(),
        ..record("Logging", 8081, &[])
    };
    let payload = NotificationPayload::new(NotificationAction::Register, announced);

    Mock::given(method("POST"))
        .and(path("/notify"))
        .and(body_json(serde_json::json!({
            "action": "register",
            "registration": {
                "id": "logging-1",
                "serviceType": "Logging",
                "ip": "127.0.0.1",
                "port": 8081,
                "requiredServices": [],
                "notificationEndpoint": "http://svc-8081/notify",
                "healthCheckEndpoint": "http://svc-8081/healthcheck"
            }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sender = HttpNotificationSender::new(Duration::from_secs(2)).unwrap();
    sender
        .deliver(&format!("{}/notify", mock_server.uri()), &payload)
        .await
        .expect("delivery failed");
}

#[tokio::test]
async fn test_http_sender_reports_rejection_and_unreachable() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&mock_server)
        .await;

    let sender = HttpNotificationSender::new(Duration::from_secs(2)).unwrap();
    let payload =
        NotificationPayload::new(NotificationAction::Deregister, record("Logging", 8081, &[]));

    let rejected = sender
        .deliver(&format!("{}/notify", mock_server.uri()), &payload)
        .await;
    assert!(matches!(
        rejected,
        Err(NotificationError::Rejected { status: 400, .. })
    ));

    let unreachable = sender.deliver("http://127.0.0.1:1/notify", &payload).await;
    assert!(unreachable.is_err());

    let empty = sender.deliver("", &payload).await;
    assert!(matches!(empty, Err(NotificationError::InvalidEndpoint(_))));
}

#[tokio::test]
async fn test_http_sender_times_out() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let sender = HttpNotificationSender::new(Duration::from_millis(100)).unwrap();
    let payload =
        NotificationPayload::new(NotificationAction::Register, record("Logging", 8081, &[]));

    let result = sender
        .deliver(&format!("{}/notify", mock_server.uri()), &payload)
        .await;
    assert!(matches!(result, Err(NotificationError::Timeout { .. })));
}

#[test]
fn test_payload_wire_format() {
    let payload = NotificationPayload::new(
        NotificationAction::Deregister,
        RegistrationRecord {
            id: "abc".to_string(),
            ..record("Logging", 8081, &[])
        },
    );

    let value = serde_json::to_value(&payload).unwrap();
    assert_eq!(value["action"], "deregister");
    assert_eq!(value["registration"]["serviceType"], "Logging");
    assert_eq!(value["registration"]["id"], "abc");

    let unknown = serde_json::from_str::<NotificationPayload>(
        r#"{"action":"update","registration":{"serviceType":"Logging"}}"#,
    );
    assert!(unknown.is_err());
}

#[test]
fn test_legacy_field_names_accepted() {
    let parsed: RegistrationRecord = serde_json::from_str(
        r#"{"serviceType":"Business","ip":"10.0.0.2","port":8082,
            "dependentServices":["Logging"],
            "notificationEndpoint":"http://10.0.0.2:8082/notify",
            "healthcheckEndpoint":"http://10.0.0.2:8082/healthcheck"}"#,
    )
    .unwrap();

    assert_eq!(parsed.required_services, vec!["Logging".to_string()]);
    assert_eq!(parsed.health_check_endpoint, "http://10.0.0.2:8082/healthcheck");
    assert!(parsed.id.is_empty());
}

fn announced(service_type: &str, id: &str, ip: &str, port: u16) -> RegistrationRecord {
    RegistrationRecord {
        id: id.to_string(),
        service_type: service_type.to_string(),
        ip: ip.to_string(),
        port,
        ..Default::default()
    }
}

#[test]
fn test_register_notification_first_writer_wins() {
    let cache = ConnectedInstanceCache::new();
    let required = vec!["Logging".to_string()];

    let first = NotificationPayload::new(
        NotificationAction::Register,
        announced("Logging", "l1", "10.0.0.1", 8081),
    );
    let second = NotificationPayload::new(
        NotificationAction::Register,
        announced("Logging", "l2", "10.0.0.2", 8081),
    );

    assert_eq!(
        apply_notification(&cache, &required, &first),
        NotificationOutcome::Attached
    );
    assert_eq!(
        apply_notification(&cache, &required, &second),
        NotificationOutcome::AlreadyConnected
    );
    assert_eq!(
        cache.get("Logging"),
        Some(ConnectedInstance {
            id: "l1".to_string(),
            ip: "10.0.0.1".to_string(),
            port: 8081,
        })
    );
}

#[test]
fn test_register_notification_fills_every_missing_dependency() {
    let cache = ConnectedInstanceCache::new();
    let required = vec!["Logging".to_string(), "Metrics".to_string()];

    let payload = NotificationPayload::new(
        NotificationAction::Register,
        announced("Logging", "l1", "10.0.0.1", 8081),
    );
    assert_eq!(
        apply_notification(&cache, &required, &payload),
        NotificationOutcome::Attached
    );

    // 尚未解析的依赖都指向同一个宣告的实例
    assert_eq!(cache.get("Logging").map(|i| i.id), Some("l1".to_string()));
    assert_eq!(cache.get("Metrics").map(|i| i.id), Some("l1".to_string()));

    let later = NotificationPayload::new(
        NotificationAction::Register,
        announced("Metrics", "m1", "10.0.0.9", 9000),
    );
    assert_eq!(
        apply_notification(&cache, &required, &later),
        NotificationOutcome::AlreadyConnected
    );
    assert_eq!(cache.get("Metrics").map(|i| i.id), Some("l1".to_string()));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_register_notification_without_dependencies() {
    let cache = ConnectedInstanceCache::new();

    let payload = NotificationPayload::new(
        NotificationAction::Register,
        announced("Logging", "l1", "10.0.0.1", 8081),
    );
    assert_eq!(
        apply_notification(&cache, &[], &payload),
        NotificationOutcome::AlreadyConnected
    );
    assert!(cache.is_empty());
}

#[test]
fn test_deregister_notification_requires_matching_address() {
    let cache = ConnectedInstanceCache::new();
    let required = vec!["Logging".to_string()];

    apply_notification(
        &cache,
        &required,
        &NotificationPayload::new(
            NotificationAction::Register,
            announced("Logging", "l1", "10.0.0.1", 8081),
        ),
    );

    // 同类型的另一个实例注销，缓存保持不变
    let other = NotificationPayload::new(
        NotificationAction::Deregister,
        announced("Logging", "l2", "10.0.0.2", 8081),
    );
    assert_eq!(
        apply_notification(&cache, &required, &other),
        NotificationOutcome::Mismatch
    );
    assert!(cache.contains("Logging"));

    let same = NotificationPayload::new(
        NotificationAction::Deregister,
        announced("Logging", "l1", "10.0.0.1", 8081),
    );
    assert_eq!(
        apply_notification(&cache, &required, &same),
        NotificationOutcome::Detached
    );
    assert!(cache.is_empty());

    assert_eq!(
        apply_notification(&cache, &required, &same),
        NotificationOutcome::NotConnected
    );
}

#[test]
fn test_cache_refills_after_detach() {
    let cache = ConnectedInstanceCache::new();
    let required = vec!["Logging".to_string()];

    let l1 = announced("Logging", "l1", "10.0.0.1", 8081);
    let l2 = announced("Logging", "l2", "10.0.0.2", 8081);

    apply_notification(
        &cache,
        &required,
        &NotificationPayload::new(NotificationAction::Register, l1.clone()),
    );
    apply_notification(
        &cache,
        &required,
        &NotificationPayload::new(NotificationAction::Deregister, l1),
    );
    apply_notification(
        &cache,
        &required,
        &NotificationPayload::new(NotificationAction::Register, l2),
    );

    assert_eq!(cache.get("Logging").map(|i| i.id), Some("l2".to_string()));
}
