use async_trait::async_trait;
use domain::{
    ContentType, LanguageCode, MessageId, RepositoryError, RoomKey, SenderInfo, Timestamp, UserId,
};

/// 待保存的消息行
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub id: MessageId,
    pub room: RoomKey,
    pub sender: SenderInfo,
    pub content: String,
    pub caption: Option<String>,
    pub content_type: ContentType,
    pub origin_language: LanguageCode,
    pub created_at: Timestamp,
}

/// 持久化后由存储确认的标识与时间
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub created_at: Timestamp,
}

/// 译文对应的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslationKind {
    Content,
    Caption,
}

impl TranslationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationKind::Content => "content",
            TranslationKind::Caption => "caption",
        }
    }
}

/// 私聊房间记录
#[derive(Debug, Clone, PartialEq)]
pub struct PrivateRoom {
    pub key: RoomKey,
    pub id: uuid::Uuid,
}

/// 持久化网关
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn save_message(&self, message: NewMessage) -> Result<StoredMessage, RepositoryError>;

    async fn save_translation(
        &self,
        message_id: MessageId,
        kind: TranslationKind,
        language: LanguageCode,
        text: String,
    ) -> Result<(), RepositoryError>;

    /// 活跃用户使用的语言（去重）
    async fn active_languages(&self) -> Result<Vec<LanguageCode>, RepositoryError>;

    /// 记录用户在线及其首选语言，供 `active_languages` 统计
    async fn record_presence(
        &self,
        user: &SenderInfo,
        language: &LanguageCode,
    ) -> Result<(), RepositoryError>;

    /// 幂等地创建或获取两人私聊房间
    async fn ensure_private_room(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<PrivateRoom, RepositoryError>;
}
