use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const CONFIG_PATH_ENV: &str = "DIRECTORY_CONFIG";
const ENV_PREFIX: &str = "DIRECTORY_";

/// 配置加载错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid environment override: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub registry: RegistryConfig,
    pub client: ClientConfig,
    pub notification: NotificationConfig,
    pub health: HealthConfig,
    pub server: ServerConfig,
    pub log: LogConfig,
}

/// 本服务自身的描述
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub service_type: String,
    pub bind_host: String,
    pub port: u16,
    /// 注册到注册表时使用的 IP
    pub advertise_ip: String,
    pub required_services: Vec<String>,
    /// 未配置时根据 advertise_ip 与实际监听端口生成
    pub notification_url: Option<String>,
    pub health_check_url: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_type: "Registrar".to_string(),
            bind_host: "0.0.0.0".to_string(),
            port: 8080,
            advertise_ip: "127.0.0.1".to_string(),
            required_services: Vec::new(),
            notification_url: None,
            health_check_url: None,
        }
    }
}

/// 注册表地址
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub registration_url: String,
    pub deregistration_url: String,
    /// 注册结果不确定时用于查询已有记录
    pub services_url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registration_url: "http://localhost:8080/register".to_string(),
            deregistration_url: "http://localhost:8080/deregister".to_string(),
            services_url: "http://localhost:8080/services".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub request_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 3000,
            retry_attempts: 1,
            retry_backoff_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// 任一通知投递失败时让整个注册/注销请求失败
    pub fail_on_error: bool,
    /// 单个目标的投递超时
    pub timeout_ms: u64,
    /// 整次扇出的上限，必须小于 `client.request_timeout_ms`
    pub fanout_deadline_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            fail_on_error: false,
            timeout_ms: 1000,
            fanout_deadline_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// 以 `DIRECTORY_` 为前缀的环境变量覆盖项
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvOverrides {
    pub service_type: Option<String>,
    pub port: Option<u16>,
    pub bind_host: Option<String>,
    pub advertise_ip: Option<String>,
    pub required_services: Option<Vec<String>>,
    pub registration_url: Option<String>,
    pub deregistration_url: Option<String>,
    pub services_url: Option<String>,
    pub notification_url: Option<String>,
    pub health_check_url: Option<String>,
    pub log_level: Option<String>,
}

impl Config {
    /// 加载 `.env`、配置文件与环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
        let mut config = Self::load_from(&path)?;

        let overrides = envy::prefixed(ENV_PREFIX).from_env::<EnvOverrides>()?;
        config.apply_overrides(overrides);
        config.validate()?;

        Ok(config)
    }

    /// 配置文件不存在时使用默认配置
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&config_str)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config_str)?)
    }

    pub fn apply_overrides(&mut self, overrides: EnvOverrides) {
        if let Some(service_type) = overrides.service_type {
            self.service.service_type = service_type;
        }
        if let Some(port) = overrides.port {
            self.service.port = port;
        }
        if let Some(bind_host) = overrides.bind_host {
            self.service.bind_host = bind_host;
        }
        if let Some(advertise_ip) = overrides.advertise_ip {
            self.service.advertise_ip = advertise_ip;
        }
        if let Some(required_services) = overrides.required_services {
            self.service.required_services = required_services
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(url) = overrides.registration_url {
            self.registry.registration_url = url;
        }
        if let Some(url) = overrides.deregistration_url {
            self.registry.deregistration_url = url;
        }
        if let Some(url) = overrides.services_url {
            self.registry.services_url = url;
        }
        if overrides.notification_url.is_some() {
            self.service.notification_url = overrides.notification_url;
        }
        if overrides.health_check_url.is_some() {
            self.service.health_check_url = overrides.health_check_url;
        }
        if let Some(level) = overrides.log_level {
            self.log.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.service_type.trim().is_empty() {
            return Err(ConfigError::Invalid("service.service_type must not be empty".into()));
        }
        if self.registry.registration_url.is_empty()
            || self.registry.deregistration_url.is_empty()
            || self.registry.services_url.is_empty()
        {
            return Err(ConfigError::Invalid("registry URLs must not be empty".into()));
        }
        // 扇出超过注册方的请求超时会让注册方在记录已保存后放弃
        if self.notification.fanout_deadline_ms >= self.client.request_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "notification.fanout_deadline_ms ({}) must be less than client.request_timeout_ms ({})",
                self.notification.fanout_deadline_ms, self.client.request_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.bind_host, self.service.port)
    }

    /// 本服务的通知地址，未配置时由实际端口生成
    pub fn notification_url(&self, port: u16) -> String {
        self.service
            .notification_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}/notify", self.service.advertise_ip, port))
    }

    pub fn health_check_url(&self, port: u16) -> String {
        self.service
            .health_check_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}/healthcheck", self.service.advertise_ip, port))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.client.request_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.client.retry_backoff_ms)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.notification.timeout_ms)
    }

    pub fn fanout_deadline(&self) -> Duration {
        Duration::from_millis(self.notification.fanout_deadline_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.health.probe_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.server.shutdown_grace_ms)
    }
}
