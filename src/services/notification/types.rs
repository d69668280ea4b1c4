use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::registry::RegistrationRecord;

/// 通知动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    Register,
    Deregister,
}

impl fmt::Display for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationAction::Register => write!(f, "register"),
            NotificationAction::Deregister => write!(f, "deregister"),
        }
    }
}

/// 发送给依赖方的通知载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub action: NotificationAction,
    pub registration: RegistrationRecord,
}

impl NotificationPayload {
    pub fn new(action: NotificationAction, registration: RegistrationRecord) -> Self {
        Self {
            action,
            registration,
        }
    }
}

/// 通知投递错误类型
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Notification to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("Notification to {endpoint} rejected with status {status}")]
    Rejected { endpoint: String, status: u16 },

    #[error("Invalid notification endpoint: '{0}'")]
    InvalidEndpoint(String),

    #[error("Notification fan-out exceeded its {deadline_ms}ms deadline")]
    DeadlineExceeded { deadline_ms: u64 },
}

/// 单个目标的投递失败记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub target_id: String,
    pub endpoint: String,
    pub error: String,
}

/// 一次扇出的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub action: NotificationAction,
    pub service_type: String,
    /// 尝试投递的目标数量
    pub attempted: usize,
    /// 成功投递的目标数量
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl FanoutReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
