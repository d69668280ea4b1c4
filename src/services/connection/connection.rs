use serde::{Deserialize, Serialize};

use crate::services::registry::RegistrationRecord;

// 已连接的依赖实例地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedInstance {
    pub id: String,
    pub ip: String,
    pub port: u16,
}

impl ConnectedInstance {
    pub fn from_record(record: &RegistrationRecord) -> Self {
        Self {
            id: record.id.clone(),
            ip: record.ip.clone(),
            port: record.port,
        }
    }

    pub fn matches(&self, ip: &str, port: u16) -> bool {
        self.ip == ip && self.port == port
    }

    /// 该实例的 HTTP 基础地址，业务路由据此拼接下游 URL
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }
}
