//! 数据库迁移
//!
//! 数据库中已应用、但当前二进制不认识的迁移版本视为结构不匹配，启动即失败。

use domain::RepositoryError;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::PgPool;
use tracing::info;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// 当前二进制已知的最新迁移版本
pub fn latest_version() -> i64 {
    MIGRATOR
        .iter()
        .map(|migration| migration.version)
        .max()
        .unwrap_or_default()
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), RepositoryError> {
    MIGRATOR.run(pool).await.map_err(|err| match err {
        MigrateError::VersionMissing(found) => RepositoryError::SchemaMismatch {
            expected: latest_version(),
            found,
        },
        other => RepositoryError::storage(other.to_string()),
    })?;
    info!(version = latest_version(), "数据库迁移完成");
    Ok(())
}
