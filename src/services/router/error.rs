use thiserror::Error;

use crate::services::notification::NotificationError;
use crate::services::registry::RegistryError;

// 定义 HTTP 接口错误类型
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to notify dependent services: {0}")]
    Notification(#[from] NotificationError),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}
