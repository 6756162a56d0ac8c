//! 房间键约定
//!
//! 房间只是一个字符串键，这里识别两种命名空间：
//! - 私聊：`private_{a}_{b}`，两个用户标识按字典序排列
//! - 机器人：`babelbot-` 前缀

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::UserId;

pub const PRIVATE_ROOM_PREFIX: &str = "private_";
pub const BOT_ROOM_PREFIX: &str = "babelbot-";

const MAX_ROOM_KEY_LEN: usize = 128;

/// 不透明的房间键。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomKey(String);

/// 房间键所属的命名空间。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomKind {
    /// 普通房间
    Ordinary,
    /// 私聊房间，参与者已按字典序排列
    Private { first: UserId, second: UserId },
    /// 机器人房间
    Bot,
}

impl RoomKey {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::invalid_room_key(value, "cannot be empty"));
        }
        if value.len() > MAX_ROOM_KEY_LEN {
            return Err(DomainError::invalid_room_key(value, "too long"));
        }
        Ok(Self(value))
    }

    /// 两个用户之间的规范私聊房间键，参数顺序无关。
    pub fn private_between(a: &UserId, b: &UserId) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{PRIVATE_ROOM_PREFIX}{first}_{second}"))
    }

    pub fn kind(&self) -> RoomKind {
        if self.0.starts_with(BOT_ROOM_PREFIX) {
            return RoomKind::Bot;
        }
        if let Some(rest) = self.0.strip_prefix(PRIVATE_ROOM_PREFIX) {
            let mut parts = rest.split('_');
            if let (Some(a), Some(b), None) = (parts.next(), parts.next(), parts.next()) {
                if let (Ok(a), Ok(b)) = (UserId::parse(a), UserId::parse(b)) {
                    let (first, second) = if a <= b { (a, b) } else { (b, a) };
                    return RoomKind::Private { first, second };
                }
            }
        }
        RoomKind::Ordinary
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RoomKey> for String {
    fn from(value: RoomKey) -> Self {
        value.0
    }
}
