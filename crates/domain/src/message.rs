use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::language::LanguageCode;
use crate::room::RoomKey;
use crate::value_objects::{MessageId, Timestamp, UserId};

const PREVIEW_CHARS: usize = 120;

/// 机器人回复固定使用的发送者。
pub const BOT_SENDER_ID: &str = "babelbot";
pub const BOT_DISPLAY_NAME: &str = "BabelBot";

/// 语言代码到译文的映射，始终包含原始语言。
pub type Translations = BTreeMap<LanguageCode, String>;

/// 消息内容类型，未知取值在反序列化时即被拒绝。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Text,
    Audio,
    Image,
    File,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Audio => "audio",
            ContentType::Image => "image",
            ContentType::File => "file",
        }
    }
}

/// 客户端发来的原始消息，只在一次处理中存在。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub room: RoomKey,
    pub content: String,
    /// 上游语音转写结果（语音消息）
    #[serde(default)]
    pub transcription: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    /// 发送者声明的语言，缺省时使用连接上的语言
    #[serde(default)]
    pub language: Option<LanguageCode>,
    #[serde(default)]
    pub content_type: ContentType,
}

impl InboundMessage {
    pub fn text(room: RoomKey, content: impl Into<String>) -> Self {
        Self {
            room,
            content: content.into(),
            transcription: None,
            caption: None,
            language: None,
            content_type: ContentType::Text,
        }
    }

    /// 需要翻译的文本：非空的转写优先，否则取正文。
    pub fn effective_text(&self) -> &str {
        match self.transcription.as_deref() {
            Some(transcription) if !transcription.trim().is_empty() => transcription,
            _ => &self.content,
        }
    }

    /// 非空的图片/文件说明文字。
    pub fn caption_text(&self) -> Option<&str> {
        self.caption
            .as_deref()
            .filter(|caption| !caption.trim().is_empty())
    }
}

/// 消息发送者描述。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderInfo {
    pub id: UserId,
    pub name: String,
}

impl SenderInfo {
    pub fn bot() -> Self {
        Self {
            id: UserId::from_static(BOT_SENDER_ID),
            name: BOT_DISPLAY_NAME.to_owned(),
        }
    }
}

/// 翻译完成后向房间广播的消息。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: MessageId,
    pub room: RoomKey,
    pub sender: SenderInfo,
    pub origin_language: LanguageCode,
    pub content_type: ContentType,
    pub content: String,
    pub translations: Translations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_translations: Option<Translations>,
    pub created_at: Timestamp,
}

impl OutboundMessage {
    /// 原始语言对应的原文。
    pub fn original_text(&self) -> &str {
        self.translations
            .get(&self.origin_language)
            .map(String::as_str)
            .unwrap_or(&self.content)
    }
}

/// 聊天列表预览事件，发送给所有连接。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room: RoomKey,
    pub message_id: MessageId,
    pub sender: SenderInfo,
    pub preview: String,
    pub origin_language: LanguageCode,
    pub created_at: Timestamp,
}

impl From<&OutboundMessage> for RoomSummary {
    fn from(message: &OutboundMessage) -> Self {
        Self {
            room: message.room.clone(),
            message_id: message.id,
            sender: message.sender.clone(),
            preview: message.original_text().chars().take(PREVIEW_CHARS).collect(),
            origin_language: message.origin_language.clone(),
            created_at: message.created_at,
        }
    }
}
