use std::time::Duration;

use application::{MessageStore, NewMessage, PrivateRoom, StoredMessage, TranslationKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config::DatabaseConfig;
use domain::{LanguageCode, MessageId, RepositoryError, RoomKey, SenderInfo, UserId};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict;
        }
    }
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        other => RepositoryError::storage(other.to_string()),
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct StoredRecord {
    id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PrivateRoomRecord {
    id: Uuid,
    room_key: String,
}

impl TryFrom<PrivateRoomRecord> for PrivateRoom {
    type Error = RepositoryError;

    fn try_from(value: PrivateRoomRecord) -> Result<Self, Self::Error> {
        let key = RoomKey::parse(value.room_key).map_err(|err| invalid_data(err.to_string()))?;
        Ok(PrivateRoom { key, id: value.id })
    }
}

/// Postgres 持久化网关
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn save_message(&self, message: NewMessage) -> Result<StoredMessage, RepositoryError> {
        let record = sqlx::query_as::<_, StoredRecord>(
            r#"
            INSERT INTO chat_messages
                (id, room_key, sender_id, sender_name, content, caption, content_type, origin_language, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, created_at
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(message.room.as_str())
        .bind(message.sender.id.as_str())
        .bind(&message.sender.name)
        .bind(&message.content)
        .bind(message.caption.as_deref())
        .bind(message.content_type.as_str())
        .bind(message.origin_language.as_str())
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(StoredMessage {
            id: MessageId::from(record.id),
            created_at: record.created_at,
        })
    }

    async fn save_translation(
        &self,
        message_id: MessageId,
        kind: TranslationKind,
        language: LanguageCode,
        text: String,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO message_translations (message_id, kind, language, translated_text)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (message_id, kind, language)
            DO UPDATE SET translated_text = EXCLUDED.translated_text
            "#,
        )
        .bind(Uuid::from(message_id))
        .bind(kind.as_str())
        .bind(language.as_str())
        .bind(text)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn active_languages(&self) -> Result<Vec<LanguageCode>, RepositoryError> {
        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT preferred_language
            FROM users
            WHERE last_seen_at > NOW() - INTERVAL '24 hours'
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(rows
            .into_iter()
            .filter_map(|code| match LanguageCode::parse(&code) {
                Ok(language) => Some(language),
                Err(err) => {
                    warn!(code = %code, error = %err, "忽略无效的用户语言");
                    None
                }
            })
            .collect())
    }

    async fn record_presence(
        &self,
        user: &SenderInfo,
        language: &LanguageCode,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, display_name, preferred_language, last_seen_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (id)
            DO UPDATE SET display_name = EXCLUDED.display_name,
                          preferred_language = EXCLUDED.preferred_language,
                          last_seen_at = NOW()
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.name)
        .bind(language.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn ensure_private_room(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<PrivateRoom, RepositoryError> {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let key = RoomKey::private_between(first, second);

        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        sqlx::query(
            r#"
            INSERT INTO private_rooms (id, room_key, user_a, user_b)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_a, user_b) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(key.as_str())
        .bind(first.as_str())
        .bind(second.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        let record = sqlx::query_as::<_, PrivateRoomRecord>(
            r#"SELECT id, room_key FROM private_rooms WHERE user_a = $1 AND user_b = $2"#,
        )
        .bind(first.as_str())
        .bind(second.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;
        PrivateRoom::try_from(record)
    }
}

pub async fn create_pg_pool(url: &str, config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(url)
        .await
}
