/// 注册表客户端错误类型
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Request to {url} timed out")]
    Timeout { url: String },
    #[error("Unexpected status code {status} from {url}: {body}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        body: String,
    },
    #[error("Failed to decode registry response: {0}")]
    Decode(String),
    #[error("Missing registration id")]
    MissingRegistrationId,
    #[error("Invalid registry URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// 网络错误、超时与 5xx 可重试；4xx 与解码错误不重试
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::Timeout { .. } => true,
            ClientError::UnexpectedStatus { status, .. } => *status >= 500,
            ClientError::Decode(_)
            | ClientError::MissingRegistrationId
            | ClientError::InvalidUrl(_) => false,
        }
    }

    /// 请求可能已被注册表处理（响应丢失、超时或服务端出错）
    pub fn may_have_been_applied(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::Timeout { .. } | ClientError::Decode(_) => true,
            ClientError::UnexpectedStatus { status, .. } => *status >= 500,
            ClientError::MissingRegistrationId | ClientError::InvalidUrl(_) => false,
        }
    }
}
