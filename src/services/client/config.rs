use std::time::Duration;

use crate::config::Config;

/// 注册表客户端配置
#[derive(Debug, Clone)]
pub struct RegistryClientConfig {
    /// 注册地址
    pub registration_url: String,
    /// 注销地址（实际请求为 `<url>/<id>`）
    pub deregistration_url: String,
    /// 服务列表地址，注册结果不确定时据此查找已保存的记录
    pub services_url: String,
    /// 单次请求超时时间
    pub request_timeout: Duration,
    /// 失败后的额外重试次数
    pub retry_attempts: u32,
    /// 首次重试前的等待时间，之后每次翻倍
    pub retry_backoff: Duration,
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            registration_url: "http://localhost:8080/register".to_string(),
            deregistration_url: "http://localhost:8080/deregister".to_string(),
            services_url: "http://localhost:8080/services".to_string(),
            request_timeout: Duration::from_secs(3),
            retry_attempts: 1,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

impl From<&Config> for RegistryClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            registration_url: config.registry.registration_url.clone(),
            deregistration_url: config.registry.deregistration_url.clone(),
            services_url: config.registry.services_url.clone(),
            request_timeout: config.request_timeout(),
            retry_attempts: config.client.retry_attempts,
            retry_backoff: config.retry_backoff(),
        }
    }
}
