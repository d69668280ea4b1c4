use std::future::Future;

use http::StatusCode;
use reqwest::{Client, RequestBuilder, Response, Url};
use tokio::time::timeout;

use super::config::RegistryClientConfig;
use super::error::ClientError;
use crate::services::registry::RegistrationRecord;

/// 注册表客户端：服务启动时注册自身，关闭时注销
#[derive(Debug, Clone)]
pub struct RegistryClient {
    config: RegistryClientConfig,
    client: Client,
}

impl RegistryClient {
    pub fn new(config: RegistryClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { config, client })
    }

    /// 注册自身，返回注册表保存的记录（包含分配的 id）
    ///
    /// 注册不是幂等的：超时或 5xx 时注册表可能已经保存了记录，
    /// 因此重试前先按 (serviceType, ip, port) 查找并沿用已有记录。
    pub async fn register(
        &self,
        record: &RegistrationRecord,
    ) -> Result<RegistrationRecord, ClientError> {
        let mut attempt = 0;
        let mut backoff = self.config.retry_backoff;

        loop {
            let error = match self.try_register(record).await {
                Ok(stored) => return Ok(stored),
                Err(e) => e,
            };

            if error.may_have_been_applied() {
                match self.find_registered(record).await {
                    Ok(Some(existing)) => {
                        tracing::warn!(
                            id = %existing.id,
                            service_type = %existing.service_type,
                            error = %error,
                            "Registration was stored despite the failed response, adopting existing record"
                        );
                        return Ok(existing);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to look up existing registration");
                    }
                }
            }

            if attempt >= self.config.retry_attempts || !error.is_retryable() {
                return Err(error);
            }

            attempt += 1;
            tracing::warn!(
                operation = "register",
                attempt = attempt,
                max_retries = self.config.retry_attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Registry call failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }
    }

    /// 查找与给定记录为同一实例的已注册记录
    pub async fn find_registered(
        &self,
        record: &RegistrationRecord,
    ) -> Result<Option<RegistrationRecord>, ClientError> {
        let url = Url::parse_with_params(
            &self.config.services_url,
            &[("type", record.service_type.as_str())],
        )
        .map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", self.config.services_url)))?;

        let response = self
            .send(self.client.get(url.clone()), url.as_str())
            .await?;
        let services = response
            .json::<Vec<RegistrationRecord>>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        Ok(services
            .into_iter()
            .find(|existing| existing.same_instance(record)))
    }

    /// 按 id 注销
    pub async fn deregister(&self, id: &str) -> Result<(), ClientError> {
        if id.is_empty() {
            return Err(ClientError::MissingRegistrationId);
        }

        self.with_retry("deregister", move || self.try_deregister(id))
            .await
    }

    async fn try_register(
        &self,
        record: &RegistrationRecord,
    ) -> Result<RegistrationRecord, ClientError> {
        let url = &self.config.registration_url;
        let response = self.send(self.client.post(url).json(record), url).await?;

        response
            .json::<RegistrationRecord>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn try_deregister(&self, id: &str) -> Result<(), ClientError> {
        let url = format!(
            "{}/{}",
            self.config.deregistration_url.trim_end_matches('/'),
            id
        );
        self.send(self.client.delete(&url), &url).await?;
        Ok(())
    }

    // 带超时发送请求，非 200 视为失败
    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, ClientError> {
        let response = match timeout(self.config.request_timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => {
                return Err(ClientError::Timeout {
                    url: url.to_string(),
                });
            }
            Ok(Err(e)) => return Err(ClientError::Transport(e)),
            Err(_) => {
                return Err(ClientError::Timeout {
                    url: url.to_string(),
                });
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    // 有限次重试，退避时间逐次翻倍
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut attempt = 0;
        let mut backoff = self.config.retry_backoff;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.retry_attempts && e.is_retryable() => {
                    attempt += 1;
                    tracing::warn!(
                        operation = %operation,
                        attempt = attempt,
                        max_retries = self.config.retry_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Registry call failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
