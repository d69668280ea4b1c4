use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use super::types::HealthCheckResult;
use crate::services::context::ServiceContext;

/// `GET /healthcheck`：报告自身状态
pub async fn handle_health_check(
    State(context): State<Arc<ServiceContext>>,
) -> Json<HealthCheckResult> {
    Json(context.health_report().await)
}
