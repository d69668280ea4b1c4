//! Server runtime embedded by every participating service.
//!
//! Lifecycle: `Idle -> Starting -> Registered -> Serving -> ShuttingDown -> Deregistered -> Stopped`.
//! Only a failure to bind the listener is fatal; registry calls are logged and skipped.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::services::client::{ClientError, RegistryClient, RegistryClientConfig};
use crate::services::connection::handle_notification;
use crate::services::context::ServiceContext;
use crate::services::health::handler::handle_health_check;

/// 服务实例的生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Registered,
    Serving,
    ShuttingDown,
    Deregistered,
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),
    #[error("Server task failed: {0}")]
    Task(String),
    #[error("Registry client error: {0}")]
    Client(#[from] ClientError),
}

/// 服务运行时：加入目录、提供服务、退出目录
pub struct ServerRuntime {
    config: Config,
    context: Arc<ServiceContext>,
    client: RegistryClient,
    routes: Router,
    lifecycle: watch::Sender<LifecycleState>,
}

impl ServerRuntime {
    pub fn new(config: &Config, routes: Router) -> Result<Self, RuntimeError> {
        Self::with_context(config, ServiceContext::from_config(config), routes)
    }

    /// 业务路由需要访问依赖缓存时，先创建上下文再传入
    pub fn with_context(
        config: &Config,
        context: Arc<ServiceContext>,
        routes: Router,
    ) -> Result<Self, RuntimeError> {
        let client = RegistryClient::new(RegistryClientConfig::from(config))?;
        let (lifecycle, _) = watch::channel(LifecycleState::Idle);

        Ok(Self {
            config: config.clone(),
            context,
            client,
            routes,
            lifecycle,
        })
    }

    pub fn context(&self) -> Arc<ServiceContext> {
        self.context.clone()
    }

    pub fn state(&self) -> LifecycleState {
        *self.lifecycle.borrow()
    }

    /// 订阅生命周期变化
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// 运行直到收到 Ctrl+C 或 SIGTERM
    pub async fn run(self) -> Result<(), RuntimeError> {
        self.run_until(shutdown_signal()).await
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            context,
            client,
            routes,
            lifecycle,
        } = self;

        let transition = |state: LifecycleState| {
            lifecycle.send_replace(state);
            tracing::debug!(service_type = %context.service_type(), state = ?state, "Lifecycle transition");
        };

        transition(LifecycleState::Starting);

        let bind_addr = config.bind_address();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| RuntimeError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| RuntimeError::Bind { addr: bind_addr, source })?;

        // 端口为 0 时以实际监听端口生成回调地址
        let port = local_addr.port();
        context
            .set_endpoint(
                &config.service.advertise_ip,
                port,
                config.notification_url(port),
                config.health_check_url(port),
            )
            .await;

        let app = routes.merge(runtime_routes(context.clone()));
        let token = CancellationToken::new();
        let server_token = token.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await })
                .await
        });

        tracing::info!(
            service_type = %context.service_type(),
            address = %local_addr,
            "Server listening"
        );

        // 注册失败不致命，服务以降级模式继续运行
        match client.register(&context.registration_record().await).await {
            Ok(stored) => {
                tracing::info!(
                    service_type = %context.service_type(),
                    id = %stored.id,
                    "Registered with service registry"
                );
                context.set_registration_id(stored.id).await;
                transition(LifecycleState::Registered);
            }
            Err(e) => {
                tracing::error!(
                    service_type = %context.service_type(),
                    error = %e,
                    "Error registering server, continuing without registration"
                );
            }
        }

        transition(LifecycleState::Serving);

        let early_exit = tokio::select! {
            _ = shutdown => None,
            result = &mut server => Some(result),
        };

        transition(LifecycleState::ShuttingDown);
        tracing::info!(service_type = %context.service_type(), "Shutting down server...");

        if let Some(id) = context.registration_id().await {
            match client.deregister(&id).await {
                Ok(()) => {
                    tracing::info!(id = %id, "Deregistered from service registry");
                    context.clear_registration_id().await;
                }
                Err(e) => {
                    tracing::error!(id = %id, error = %e, "Error deregistering server");
                }
            }
        }

        transition(LifecycleState::Deregistered);
        token.cancel();

        let outcome = match early_exit {
            Some(result) => result,
            None => match tokio::time::timeout(config.shutdown_grace(), &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        grace_ms = config.server.shutdown_grace_ms,
                        "Graceful shutdown timed out, aborting server task"
                    );
                    server.abort();
                    Ok(Ok(()))
                }
            },
        };

        transition(LifecycleState::Stopped);

        match outcome {
            Ok(Ok(())) => {
                tracing::info!(service_type = %context.service_type(), "Server gracefully stopped.");
                Ok(())
            }
            Ok(Err(e)) => Err(RuntimeError::Serve(e)),
            Err(e) => Err(RuntimeError::Task(e.to_string())),
        }
    }
}

/// 每个服务都必须暴露的两个路由
pub fn runtime_routes(context: Arc<ServiceContext>) -> Router {
    Router::new()
        .route("/notify", post(handle_notification))
        .route("/healthcheck", get(handle_health_check))
        .with_state(context)
}

/// Graceful shutdown signal handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
