use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::RwLock;

use crate::config::Config;
use crate::services::connection::{ConnectedInstance, ConnectedInstanceCache};
use crate::services::health::HealthCheckResult;
use crate::services::registry::RegistrationRecord;
use crate::services::router::ApiError;

/// 每个参与服务持有的运行时上下文
///
/// 保存自身的注册信息、注册表分配的 id 以及依赖实例缓存。
#[derive(Debug)]
pub struct ServiceContext {
    service_type: String,
    required_services: Vec<String>,
    registration: RwLock<RegistrationRecord>,
    cache: ConnectedInstanceCache,
}

impl ServiceContext {
    pub fn new(service_type: impl Into<String>, required_services: Vec<String>) -> Self {
        let service_type = service_type.into();

        Self {
            registration: RwLock::new(RegistrationRecord {
                service_type: service_type.clone(),
                required_services: required_services.clone(),
                ..Default::default()
            }),
            service_type,
            required_services,
            cache: ConnectedInstanceCache::new(),
        }
    }

    pub fn from_config(config: &Config) -> Arc<Self> {
        Arc::new(Self::new(
            config.service.service_type.clone(),
            config.service.required_services.clone(),
        ))
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn required_services(&self) -> &[String] {
        &self.required_services
    }

    pub fn cache(&self) -> &ConnectedInstanceCache {
        &self.cache
    }

    /// 监听地址确定后写入自身的网络位置与回调地址
    pub async fn set_endpoint(
        &self,
        ip: &str,
        port: u16,
        notification_endpoint: String,
        health_check_endpoint: String,
    ) {
        let mut registration = self.registration.write().await;
        registration.ip = ip.to_string();
        registration.port = port;
        registration.notification_endpoint = notification_endpoint;
        registration.health_check_endpoint = health_check_endpoint;
    }

    pub async fn registration_record(&self) -> RegistrationRecord {
        self.registration.read().await.clone()
    }

    /// 注册表分配的 id，未注册成功时为 None
    pub async fn registration_id(&self) -> Option<String> {
        let registration = self.registration.read().await;
        (!registration.id.is_empty()).then(|| registration.id.clone())
    }

    pub async fn set_registration_id(&self, id: String) {
        self.registration.write().await.id = id;
    }

    pub async fn clear_registration_id(&self) {
        self.registration.write().await.id.clear();
    }

    pub async fn health_report(&self) -> HealthCheckResult {
        let id = self.registration_id().await.unwrap_or_default();
        HealthCheckResult::healthy(&id, &self.service_type, "Service is healthy")
    }

    /// 取出已解析的依赖实例，尚未解析时返回 503 类错误
    pub fn require_dependency(&self, service_type: &str) -> Result<ConnectedInstance, ApiError> {
        self.cache.get(service_type).ok_or_else(|| {
            ApiError::ServiceUnavailable(format!(
                "required service '{service_type}' is not connected yet"
            ))
        })
    }

    pub fn missing_dependencies(&self) -> Vec<String> {
        self.required_services
            .iter()
            .filter(|service| !self.cache.contains(service))
            .cloned()
            .collect()
    }

    pub fn is_ready(&self) -> bool {
        self.missing_dependencies().is_empty()
    }
}

/// 依赖就绪门控中间件
///
/// 任一声明的依赖尚未解析时直接返回 503，而不是阻塞启动。
pub async fn dependency_gate(
    State(context): State<Arc<ServiceContext>>,
    request: Request,
    next: Next,
) -> Response {
    let missing = context.missing_dependencies();
    if !missing.is_empty() {
        tracing::debug!(
            path = %request.uri().path(),
            missing = ?missing,
            "Rejecting request until dependencies are connected"
        );
        return ApiError::ServiceUnavailable(format!(
            "waiting for required services: {}",
            missing.join(", ")
        ))
        .into_response();
    }

    next.run(request).await
}
