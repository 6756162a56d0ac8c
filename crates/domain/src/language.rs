//! 语言代码与基于 Unicode 文字区段的语言检测

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// 检测失败或未声明语言时使用的默认语言。
pub const FALLBACK_LANGUAGE: &str = "en";

/// 规范化的语言代码（小写，如 `en`、`he`、`pt-br`）。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn parse(value: impl AsRef<str>) -> Result<Self, DomainError> {
        let normalized = value.as_ref().trim().to_ascii_lowercase();
        let valid_len = (2..=10).contains(&normalized.len());
        let valid_chars = normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c == '-');
        if !valid_len || !valid_chars || normalized.starts_with('-') {
            return Err(DomainError::InvalidLanguageCode(value.as_ref().to_owned()));
        }
        Ok(Self(normalized))
    }

    pub fn fallback() -> Self {
        Self(FALLBACK_LANGUAGE.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 仅用于内部常量，调用方保证格式正确。
    fn from_static(code: &'static str) -> Self {
        Self(code.to_owned())
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<LanguageCode> for String {
    fn from(value: LanguageCode) -> Self {
        value.0
    }
}

/// 文字区段检测表，按优先级排列。
///
/// 假名必须排在 CJK 统一汉字之前，否则混写汉字的日文会被判为中文。
const SCRIPT_RANGES: &[(char, char, &str)] = &[
    ('\u{0590}', '\u{05FF}', "he"),
    ('\u{0600}', '\u{06FF}', "ar"),
    ('\u{0400}', '\u{04FF}', "ru"),
    ('\u{0370}', '\u{03FF}', "el"),
    ('\u{0900}', '\u{097F}', "hi"),
    ('\u{0E00}', '\u{0E7F}', "th"),
    ('\u{3040}', '\u{30FF}', "ja"),
    ('\u{AC00}', '\u{D7AF}', "ko"),
    ('\u{4E00}', '\u{9FFF}', "zh"),
];

/// 根据文本中出现的文字区段推断语言。
///
/// 空白文本或没有命中任何区段时返回 `fallback`。纯函数，对任意输入都有结果。
pub fn detect_language(text: &str, fallback: &LanguageCode) -> LanguageCode {
    if text.trim().is_empty() {
        return fallback.clone();
    }

    SCRIPT_RANGES
        .iter()
        .find(|(start, end, _)| text.chars().any(|c| (*start..=*end).contains(&c)))
        .map(|(_, _, code)| LanguageCode::from_static(code))
        .unwrap_or_else(|| fallback.clone())
}
