pub mod error;
pub mod response;

pub use error::ApiError;

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;

use super::health::{HealthAggregator, HealthCheckResult};
use super::notification::{NotificationAction, Notifier};
use super::registry::{RegistrationRecord, ServiceRegistry};

// `GET /services` 的查询参数
#[derive(Debug, Default, Deserialize)]
pub struct ServiceQuery {
    #[serde(rename = "type")]
    pub service_type: Option<String>,
}

// 注册表 HTTP 接口
#[derive(Debug, Clone)]
pub struct RegistryApi {
    pub registry: ServiceRegistry,
    pub notifier: Notifier,
    pub health: HealthAggregator,
}

impl RegistryApi {
    pub fn new(registry: ServiceRegistry, notifier: Notifier, health: HealthAggregator) -> Self {
        Self {
            registry,
            notifier,
            health,
        }
    }

    pub fn routes(self) -> Router {
        Router::new()
            .route("/register", post(Self::register_service))
            .route("/services", get(Self::list_services))
            .route("/services/{id}", get(Self::get_service))
            .route("/deregister", delete(Self::missing_service_id))
            .route("/deregister/", delete(Self::missing_service_id))
            .route("/deregister/{id}", delete(Self::deregister_service))
            .route("/healthchecks", get(Self::health_checks))
            .with_state(Arc::new(self))
    }

    // 注册成功后同步扇出通知，调用方在扇出结束后才收到响应
    async fn register_service(
        State(api): State<Arc<Self>>,
        body: Bytes,
    ) -> Result<Json<RegistrationRecord>, ApiError> {
        let registration: RegistrationRecord = serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(error = %e, "Failed to decode registration request");
            ApiError::BadRequest("invalid request body".to_string())
        })?;

        let stored = api.registry.register(registration).await?;
        api.notifier
            .fan_out(NotificationAction::Register, &stored)
            .await?;

        Ok(Json(stored))
    }

    async fn list_services(
        State(api): State<Arc<Self>>,
        Query(query): Query<ServiceQuery>,
    ) -> Result<Json<Vec<RegistrationRecord>>, ApiError> {
        let services = match query.service_type {
            Some(service_type) => api.registry.list_by_type(&service_type).await?,
            None => api.registry.list_all().await,
        };

        Ok(Json(services))
    }

    async fn get_service(
        State(api): State<Arc<Self>>,
        Path(id): Path<String>,
    ) -> Result<Json<RegistrationRecord>, ApiError> {
        Ok(Json(api.registry.find_by_id(&id).await?))
    }

    async fn missing_service_id() -> ApiError {
        ApiError::BadRequest("invalid service ID".to_string())
    }

    // 先从注册表移除，再通知依赖方
    async fn deregister_service(
        State(api): State<Arc<Self>>,
        Path(id): Path<String>,
    ) -> Result<&'static str, ApiError> {
        if id.trim().is_empty() {
            return Err(ApiError::BadRequest("invalid service ID".to_string()));
        }

        let removed = api.registry.deregister(&id).await?;
        api.notifier
            .fan_out(NotificationAction::Deregister, &removed)
            .await?;

        Ok("Service deregistered successfully")
    }

    async fn health_checks(State(api): State<Arc<Self>>) -> Json<Vec<HealthCheckResult>> {
        Json(api.health.run_health_check().await)
    }
}
