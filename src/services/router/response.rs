use axum::response::{IntoResponse, Response};
use http::StatusCode;

use super::error::ApiError;
use crate::services::registry::RegistryError;

impl ApiError {
    // 参数错误与解码失败返回 4xx；未找到与重复注册沿用 500
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Registry(RegistryError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            ApiError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

// 创建错误响应
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        tracing::warn!(status = %status, message = %message, "Creating error response");

        (status, message).into_response()
    }
}
