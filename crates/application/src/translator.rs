use async_trait::async_trait;
use domain::LanguageCode;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TranslationError {
    #[error("translation provider error: {0}")]
    Provider(String),
    #[error("translation timed out")]
    Timeout,
    #[error("malformed translation response: {0}")]
    Malformed(String),
}

/// 翻译服务
///
/// 每次调用只翻译一个 (文本, 目标语言) 组合；失败由调用方回退为原文。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> Result<String, TranslationError>;
}
