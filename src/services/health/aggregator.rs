use std::time::Duration;

use futures::future::join_all;
use http::StatusCode;
use reqwest::Client;
use tokio::time::timeout;

use super::types::HealthCheckResult;
use crate::services::client::ClientError;
use crate::services::registry::{RegistrationRecord, ServiceRegistry};

/// 全量健康检查聚合器
#[derive(Debug, Clone)]
pub struct HealthAggregator {
    registry: ServiceRegistry,
    client: Client,
    probe_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(registry: ServiceRegistry, probe_timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(probe_timeout).build()?;

        Ok(Self {
            registry,
            client,
            probe_timeout,
        })
    }

    /// 探测所有已注册实例
    ///
    /// 探测并发执行，每个探测都有独立超时；结果顺序与 `list_all` 一致，
    /// 单个实例失败只会得到 `healthy=false` 的结果。
    pub async fn run_health_check(&self) -> Vec<HealthCheckResult> {
        let services = self.registry.list_all().await;
        let results = join_all(services.iter().map(|service| self.probe(service))).await;

        let healthy = results.iter().filter(|r| r.healthy).count();
        tracing::info!(
            total = results.len(),
            healthy = healthy,
            unhealthy = results.len() - healthy,
            "Health check scan completed"
        );

        results
    }

    async fn probe(&self, service: &RegistrationRecord) -> HealthCheckResult {
        let url = &service.health_check_endpoint;

        match timeout(self.probe_timeout, self.client.get(url).send()).await {
            Ok(Ok(response)) => {
                let status = response.status();
                let message = format!(
                    "Health check {}",
                    status.canonical_reason().unwrap_or(status.as_str())
                );

                if status == StatusCode::OK {
                    tracing::debug!(service_id = %service.id, url = %url, "Health check passed");
                    HealthCheckResult::healthy(&service.id, &service.service_type, message)
                } else {
                    tracing::warn!(
                        service_id = %service.id,
                        url = %url,
                        status = %status,
                        "Health check returned non-OK status"
                    );
                    HealthCheckResult::unhealthy(&service.id, &service.service_type, message)
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(service_id = %service.id, url = %url, error = %e, "Health check error");
                HealthCheckResult::unhealthy(
                    &service.id,
                    &service.service_type,
                    format!("Health check failed: {e}"),
                )
            }
            Err(_) => {
                tracing::warn!(service_id = %service.id, url = %url, "Health check timeout");
                HealthCheckResult::unhealthy(
                    &service.id,
                    &service.service_type,
                    format!(
                        "Health check failed: timed out after {}ms",
                        self.probe_timeout.as_millis()
                    ),
                )
            }
        }
    }
}
