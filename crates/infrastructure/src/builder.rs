use std::sync::Arc;

use application::{Clock, MessageStore};
use config::AppConfig;
use domain::RepositoryError;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    bot::HttpBotClient,
    memory::InMemoryMessageStore,
    migrations::run_migrations,
    registry::InMemoryRoomRegistry,
    repository::{create_pg_pool, PgMessageStore},
    translation::HttpTranslator,
};

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema error: {0}")]
    Schema(#[from] RepositoryError),
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// 装配好的适配器集合
#[derive(Clone)]
pub struct Infrastructure {
    pub store: Arc<dyn MessageStore>,
    pub registry: Arc<InMemoryRoomRegistry>,
    pub translator: Arc<HttpTranslator>,
    pub bot: Arc<HttpBotClient>,
}

impl Infrastructure {
    /// 未配置数据库地址时退回内存存储
    pub async fn connect(
        config: &AppConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, InfrastructureError> {
        let store: Arc<dyn MessageStore> = match config.database.url.as_deref() {
            Some(url) => {
                let pool = create_pg_pool(url, &config.database).await?;
                run_migrations(&pool).await?;
                info!("使用 Postgres 持久化");
                Arc::new(PgMessageStore::new(pool))
            }
            None => {
                warn!("未配置 database.url，使用内存存储，重启后消息将丢失");
                Arc::new(InMemoryMessageStore::new(clock))
            }
        };

        Ok(Self {
            store,
            registry: Arc::new(InMemoryRoomRegistry::new()),
            translator: Arc::new(HttpTranslator::new(&config.translation)?),
            bot: Arc::new(HttpBotClient::new(&config.bot)?),
        })
    }
}
