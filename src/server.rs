use std::sync::Arc;

use axum::Router;

use crate::config::Config;
use crate::runtime::{RuntimeError, ServerRuntime};
use crate::services::client::ClientError;
use crate::services::health::HealthAggregator;
use crate::services::notification::{HttpNotificationSender, NotificationError, Notifier};
use crate::services::registry::ServiceRegistry;
use crate::services::router::RegistryApi;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("Failed to build notification sender: {0}")]
    Notification(#[from] NotificationError),
    #[error("Failed to build health checker: {0}")]
    Health(#[from] ClientError),
}

/// 组装注册表节点的路由（注册、查询、注销、全量健康检查）
pub fn registry_routes(config: &Config, registry: ServiceRegistry) -> Result<Router, ServerError> {
    let sender = HttpNotificationSender::new(config.notification_timeout())?;
    let notifier = Notifier::new(registry.clone(), Arc::new(sender))
        .with_fail_on_error(config.notification.fail_on_error)
        .with_deadline(config.fanout_deadline());
    let health = HealthAggregator::new(registry.clone(), config.probe_timeout())?;

    Ok(RegistryApi::new(registry, notifier, health).routes())
}

/// 启动注册表节点
///
/// 注册表本身也是一个参与服务：它通过同一个运行时向自己注册并在退出时注销。
pub async fn start(config: Config) -> Result<(), ServerError> {
    // 初始化服务注册表
    let registry = ServiceRegistry::new();
    let routes = registry_routes(&config, registry)?;

    tracing::info!(
        service_type = %config.service.service_type,
        bind = %config.bind_address(),
        fail_on_notify_error = config.notification.fail_on_error,
        "Starting service registry"
    );

    ServerRuntime::new(&config, routes)?.run().await?;

    Ok(())
}
