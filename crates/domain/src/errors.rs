//! 领域模型错误定义
//!
//! 定义了领域层与持久化边界上可能出现的错误类型。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 验证错误
    #[error("验证失败: {field}: {message}")]
    ValidationError { field: String, message: String },

    /// 房间键格式错误
    #[error("房间键无效: {key}: {reason}")]
    InvalidRoomKey { key: String, reason: String },

    /// 语言代码格式错误
    #[error("语言代码无效: {0}")]
    InvalidLanguageCode(String),
}

impl DomainError {
    /// 创建验证错误
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 创建房间键错误
    pub fn invalid_room_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRoomKey {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// 持久化网关错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: i64, found: i64 },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
