use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 服务注册记录
///
/// `id` 由注册表在注册时分配，调用方提交的值会被覆盖。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationRecord {
    /// 注册表分配的唯一标识
    pub id: String,
    /// 服务类型（逻辑名称，不唯一）
    pub service_type: String,
    pub ip: String,
    pub port: u16,
    /// 依赖的服务类型
    #[serde(alias = "dependentServices")]
    pub required_services: Vec<String>,
    /// 接收注册/注销通知的地址
    pub notification_endpoint: String,
    /// 健康检查地址
    #[serde(alias = "healthcheckEndpoint")]
    pub health_check_endpoint: String,
}

impl RegistrationRecord {
    /// 是否声明了对指定服务类型的依赖
    pub fn depends_on(&self, service_type: &str) -> bool {
        self.required_services.iter().any(|s| s == service_type)
    }

    /// (serviceType, ip, port) 三元组相同即视为同一实例
    pub fn same_instance(&self, other: &RegistrationRecord) -> bool {
        self.service_type == other.service_type && self.ip == other.ip && self.port == other.port
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// 注册表错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Service already registered with the same type, IP, and port: {service_type} at {ip}:{port}")]
    DuplicateRegistration {
        service_type: String,
        ip: String,
        port: u16,
    },

    #[error("Service not found: {0}")]
    NotFound(String),
}
