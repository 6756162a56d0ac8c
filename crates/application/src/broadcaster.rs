use async_trait::async_trait;
use domain::{RoomKey, ServerEvent};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 出站事件投递，返回实际投递到的连接数。
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    /// 投递给当前加入该房间的所有连接
    async fn broadcast_to_room(
        &self,
        room: &RoomKey,
        event: ServerEvent,
    ) -> Result<usize, BroadcastError>;

    /// 投递给所有连接，与房间成员关系无关
    async fn broadcast_all(&self, event: ServerEvent) -> Result<usize, BroadcastError>;
}
