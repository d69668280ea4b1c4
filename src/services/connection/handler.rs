use std::sync::Arc;

use axum::extract::State;
use bytes::Bytes;

use super::cache::ConnectedInstanceCache;
use super::connection::ConnectedInstance;
use super::types::{DetachResult, NotificationOutcome};
use crate::services::context::ServiceContext;
use crate::services::notification::{NotificationAction, NotificationPayload};
use crate::services::router::ApiError;

/// 将一条通知应用到本地依赖缓存
pub fn apply_notification(
    cache: &ConnectedInstanceCache,
    required_services: &[String],
    payload: &NotificationPayload,
) -> NotificationOutcome {
    let announced = &payload.registration;

    match payload.action {
        NotificationAction::Register => {
            tracing::info!(
                service_type = %announced.service_type,
                address = %announced.address(),
                "Received registration notification"
            );

            // 每个尚未解析的依赖都指向新宣告的实例；已有条目不覆盖
            let instance = ConnectedInstance::from_record(announced);
            let mut attached = 0;
            for dependency in required_services {
                if cache.attach_if_absent(dependency, instance.clone()) {
                    attached += 1;
                    tracing::info!(
                        dependency = %dependency,
                        service_type = %announced.service_type,
                        id = %announced.id,
                        address = %announced.address(),
                        "Added new instance for required service"
                    );
                }
            }

            if attached > 0 {
                NotificationOutcome::Attached
            } else {
                tracing::debug!(
                    service_type = %announced.service_type,
                    "Required services already connected, keeping existing instances"
                );
                NotificationOutcome::AlreadyConnected
            }
        }
        NotificationAction::Deregister => {
            tracing::info!(
                service_type = %announced.service_type,
                address = %announced.address(),
                "Received deregistration notification"
            );

            match cache.detach_if_matches(&announced.service_type, &announced.ip, announced.port)
            {
                DetachResult::Removed => {
                    tracing::info!(
                        service_type = %announced.service_type,
                        "Deregistered connected instance"
                    );
                    NotificationOutcome::Detached
                }
                DetachResult::Mismatch => {
                    tracing::info!(
                        service_type = %announced.service_type,
                        "Mismatch in IP or port for deregistering service"
                    );
                    NotificationOutcome::Mismatch
                }
                DetachResult::Missing => {
                    tracing::debug!(
                        service_type = %announced.service_type,
                        "Service not connected, nothing to deregister"
                    );
                    NotificationOutcome::NotConnected
                }
            }
        }
    }
}

/// `POST /notify`
pub async fn handle_notification(
    State(context): State<Arc<ServiceContext>>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let payload: NotificationPayload = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Failed to decode notification payload");
        ApiError::BadRequest("failed to decode notification payload".to_string())
    })?;

    apply_notification(context.cache(), context.required_services(), &payload);

    Ok("Notification handled successfully")
}
