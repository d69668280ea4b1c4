use serde::{Deserialize, Serialize};

/// 单个实例的健康检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub service_id: String,
    pub service_type: String,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl HealthCheckResult {
    pub fn healthy(service_id: &str, service_type: &str, message: impl Into<String>) -> Self {
        Self {
            service_id: service_id.to_string(),
            service_type: service_type.to_string(),
            healthy: true,
            message: message.into(),
        }
    }

    pub fn unhealthy(service_id: &str, service_type: &str, message: impl Into<String>) -> Self {
        Self {
            service_id: service_id.to_string(),
            service_type: service_type.to_string(),
            healthy: false,
            message: message.into(),
        }
    }
}
