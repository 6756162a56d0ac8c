use domain::{DomainError, RepositoryError, RoomKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    /// 私聊房间无法落库，整条消息被放弃
    #[error("failed to materialize room {room}: {source}")]
    RoomMaterialization {
        room: RoomKey,
        #[source]
        source: RepositoryError,
    },
}

impl ApplicationError {
    /// 面向客户端的稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApplicationError::Domain(_) => "INVALID_MESSAGE",
            ApplicationError::RoomMaterialization { .. } => "ROOM_UNAVAILABLE",
        }
    }
}
