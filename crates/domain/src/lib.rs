//! 多语言聊天系统核心领域模型
//!
//! 包含房间键、语言代码、入站/出站消息、传输事件等核心类型，
//! 以及纯函数形式的语言检测。

pub mod connection;
pub mod errors;
pub mod events;
pub mod language;
pub mod message;
pub mod room;
pub mod value_objects;

// 重新导出常用类型
pub use connection::ConnectionInfo;
pub use errors::{DomainError, RepositoryError};
pub use events::{ClientEvent, ErrorNotice, RoomRef, ServerEvent};
pub use language::{detect_language, LanguageCode, FALLBACK_LANGUAGE};
pub use message::{
    ContentType, InboundMessage, OutboundMessage, RoomSummary, SenderInfo, Translations,
    BOT_DISPLAY_NAME, BOT_SENDER_ID,
};
pub use room::{RoomKey, RoomKind, BOT_ROOM_PREFIX, PRIVATE_ROOM_PREFIX};
pub use value_objects::{ConnectionId, MessageId, Timestamp, UserId};
