use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::services::registry::{RegistrationRecord, ServiceRegistry};

use super::sender::NotificationSender;
use super::types::{
    DeliveryFailure, FanoutReport, NotificationAction, NotificationError, NotificationPayload,
};

/// 通知扇出器：把注册/注销事件推送给所有依赖该服务类型的实例
#[derive(Debug, Clone)]
pub struct Notifier {
    registry: ServiceRegistry,
    sender: Arc<dyn NotificationSender>,
    /// 为 true 时遇到第一个投递失败即中止并返回错误
    fail_on_error: bool,
    /// 整次扇出的时间上限，须小于注册方的请求超时
    deadline: Option<Duration>,
}

impl Notifier {
    pub fn new(registry: ServiceRegistry, sender: Arc<dyn NotificationSender>) -> Self {
        Self {
            registry,
            sender,
            fail_on_error: false,
            deadline: None,
        }
    }

    pub fn with_fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// 按 `find_dependents` 返回的顺序依次投递
    ///
    /// 默认尽力而为：单个目标失败只记录日志，继续投递其余目标。
    pub async fn fan_out(
        &self,
        action: NotificationAction,
        record: &RegistrationRecord,
    ) -> Result<FanoutReport, NotificationError> {
        let targets = self.registry.find_dependents(&record.service_type).await;
        let payload = NotificationPayload::new(action, record.clone());

        let mut report = FanoutReport {
            action,
            service_type: record.service_type.clone(),
            attempted: 0,
            delivered: 0,
            failures: Vec::new(),
        };

        let deliveries = self.deliver_all(action, record, &targets, &payload, &mut report);
        let outcome = match self.deadline {
            Some(deadline) => timeout(deadline, deliveries).await.ok(),
            None => Some(deliveries.await),
        };

        match outcome {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(e),
            None => {
                let deadline_ms = self.deadline.map_or(0, |d| d.as_millis() as u64);
                // 超时时正在投递的目标与尚未投递的目标都记为失败
                let handled = report.delivered + report.failures.len();
                let skipped = &targets[handled.min(targets.len())..];

                tracing::warn!(
                    action = %action,
                    service_type = %record.service_type,
                    deadline_ms = deadline_ms,
                    undelivered = skipped.len(),
                    "Notification fan-out deadline exceeded"
                );

                if self.fail_on_error {
                    return Err(NotificationError::DeadlineExceeded { deadline_ms });
                }

                report.attempted = targets.len();
                report
                    .failures
                    .extend(skipped.iter().map(|target| DeliveryFailure {
                        target_id: target.id.clone(),
                        endpoint: target.notification_endpoint.clone(),
                        error: format!("fan-out deadline of {deadline_ms}ms exceeded"),
                    }));
            }
        }

        if !targets.is_empty() {
            tracing::info!(
                action = %action,
                service_type = %record.service_type,
                attempted = report.attempted,
                delivered = report.delivered,
                "Notification fan-out completed"
            );
        }

        Ok(report)
    }

    async fn deliver_all(
        &self,
        action: NotificationAction,
        record: &RegistrationRecord,
        targets: &[RegistrationRecord],
        payload: &NotificationPayload,
        report: &mut FanoutReport,
    ) -> Result<(), NotificationError> {
        for target in targets {
            report.attempted += 1;

            match self
                .sender
                .deliver(&target.notification_endpoint, payload)
                .await
            {
                Ok(()) => {
                    report.delivered += 1;
                    tracing::debug!(
                        action = %action,
                        service_type = %record.service_type,
                        target_id = %target.id,
                        endpoint = %target.notification_endpoint,
                        "Notified dependent service"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        action = %action,
                        service_type = %record.service_type,
                        target_id = %target.id,
                        endpoint = %target.notification_endpoint,
                        error = %e,
                        "Failed to notify dependent service"
                    );

                    if self.fail_on_error {
                        return Err(e);
                    }

                    report.failures.push(DeliveryFailure {
                        target_id: target.id.clone(),
                        endpoint: target.notification_endpoint.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
