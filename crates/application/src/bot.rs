use async_trait::async_trait;
use domain::{LanguageCode, RoomKey, UserId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BotServiceError {
    #[error("bot service unavailable: {0}")]
    Unavailable(String),
    #[error("bot service timed out")]
    Timeout,
    #[error("malformed bot response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotRequest {
    pub message: String,
    pub user_id: UserId,
    pub room: RoomKey,
    pub language: LanguageCode,
    /// 上一轮返回的会话标识，用于保持上下文
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotReply {
    pub message: String,
    pub session_id: String,
    pub latency_ms: u64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BotService: Send + Sync {
    async fn chat(&self, request: BotRequest) -> Result<BotReply, BotServiceError>;
}
