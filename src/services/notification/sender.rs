use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::timeout;

use super::types::{NotificationError, NotificationPayload};

/// 通知投递能力
///
/// HTTP 实现是唯一的生产实现，测试中可以替换为记录型替身。
#[async_trait]
pub trait NotificationSender: Send + Sync + std::fmt::Debug {
    async fn deliver(
        &self,
        endpoint: &str,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError>;
}

/// 基于 HTTP POST 的通知发送器
#[derive(Debug, Clone)]
pub struct HttpNotificationSender {
    client: Client,
    timeout: Duration,
}

impl HttpNotificationSender {
    pub fn new(timeout: Duration) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl NotificationSender for HttpNotificationSender {
    async fn deliver(
        &self,
        endpoint: &str,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        if endpoint.is_empty() {
            return Err(NotificationError::InvalidEndpoint(endpoint.to_string()));
        }

        let response = match timeout(self.timeout, self.client.post(endpoint).json(payload).send())
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => {
                return Err(NotificationError::Timeout {
                    endpoint: endpoint.to_string(),
                });
            }
            Ok(Err(e)) => return Err(NotificationError::Transport(e)),
            Err(_) => {
                return Err(NotificationError::Timeout {
                    endpoint: endpoint.to_string(),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
