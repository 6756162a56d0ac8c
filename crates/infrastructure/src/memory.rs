//! 内存持久化网关
//!
//! 未配置数据库时使用；进程退出即丢失。行为与 Postgres 实现保持一致，
//! 包括私聊房间的幂等创建与 24 小时活跃语言窗口。

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use application::{Clock, MessageStore, NewMessage, PrivateRoom, StoredMessage, TranslationKind};
use async_trait::async_trait;
use domain::{LanguageCode, MessageId, RepositoryError, RoomKey, SenderInfo, Timestamp, UserId};
use tokio::sync::RwLock;
use uuid::Uuid;

const ACTIVE_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone)]
struct UserRecord {
    language: LanguageCode,
    last_seen_at: Timestamp,
}

#[derive(Default)]
struct MemoryState {
    messages: HashMap<MessageId, NewMessage>,
    translations: HashMap<(MessageId, TranslationKind, LanguageCode), String>,
    users: HashMap<UserId, UserRecord>,
    private_rooms: HashMap<(UserId, UserId), PrivateRoom>,
}

pub struct InMemoryMessageStore {
    state: RwLock<MemoryState>,
    clock: Arc<dyn Clock>,
}

impl InMemoryMessageStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            clock,
        }
    }

    pub async fn message(&self, id: MessageId) -> Option<NewMessage> {
        self.state.read().await.messages.get(&id).cloned()
    }

    pub async fn translation(
        &self,
        id: MessageId,
        kind: TranslationKind,
        language: &LanguageCode,
    ) -> Option<String> {
        self.state
            .read()
            .await
            .translations
            .get(&(id, kind, language.clone()))
            .cloned()
    }

    pub async fn message_count(&self) -> usize {
        self.state.read().await.messages.len()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn save_message(&self, message: NewMessage) -> Result<StoredMessage, RepositoryError> {
        let mut state = self.state.write().await;
        if state.messages.contains_key(&message.id) {
            return Err(RepositoryError::Conflict);
        }
        let stored = StoredMessage {
            id: message.id,
            created_at: message.created_at,
        };
        state.messages.insert(message.id, message);
        Ok(stored)
    }

    async fn save_translation(
        &self,
        message_id: MessageId,
        kind: TranslationKind,
        language: LanguageCode,
        text: String,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.messages.contains_key(&message_id) {
            return Err(RepositoryError::NotFound);
        }
        state.translations.insert((message_id, kind, language), text);
        Ok(())
    }

    async fn active_languages(&self) -> Result<Vec<LanguageCode>, RepositoryError> {
        let cutoff = self.clock.now() - chrono::Duration::hours(ACTIVE_WINDOW_HOURS);
        let state = self.state.read().await;
        let languages: BTreeSet<LanguageCode> = state
            .users
            .values()
            .filter(|user| user.last_seen_at > cutoff)
            .map(|user| user.language.clone())
            .collect();
        Ok(languages.into_iter().collect())
    }

    async fn record_presence(
        &self,
        user: &SenderInfo,
        language: &LanguageCode,
    ) -> Result<(), RepositoryError> {
        let now = self.clock.now();
        self.state.write().await.users.insert(
            user.id.clone(),
            UserRecord {
                language: language.clone(),
                last_seen_at: now,
            },
        );
        Ok(())
    }

    async fn ensure_private_room(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<PrivateRoom, RepositoryError> {
        let pair = if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        let mut state = self.state.write().await;
        let room = state
            .private_rooms
            .entry(pair)
            .or_insert_with_key(|(first, second)| PrivateRoom {
                key: RoomKey::private_between(first, second),
                id: Uuid::new_v4(),
            });
        Ok(room.clone())
    }
}
