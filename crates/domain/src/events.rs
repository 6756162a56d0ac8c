//! WebSocket 传输事件
//!
//! 线上格式为 `{"type": "...", "payload": {...}}`。

use serde::{Deserialize, Serialize};

use crate::message::{InboundMessage, OutboundMessage, RoomSummary};
use crate::room::RoomKey;

/// 只携带房间键的负载。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRef {
    pub room: RoomKey,
}

/// 客户端到服务器的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(RoomRef),
    LeaveRoom(RoomRef),
    SendMessage(InboundMessage),
}

/// 发给单个连接的错误通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub code: String,
    pub message: String,
}

/// 服务器到客户端的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerEvent {
    NewMessage(OutboundMessage),
    RoomSummary(RoomSummary),
    JoinedRoom(RoomRef),
    LeftRoom(RoomRef),
    Error(ErrorNotice),
}

impl ServerEvent {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(ErrorNotice {
            code: code.into(),
            message: message.into(),
        })
    }
}
