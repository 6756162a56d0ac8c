use serde::{Deserialize, Serialize};

use crate::language::LanguageCode;
use crate::message::SenderInfo;
use crate::value_objects::{ConnectionId, UserId};

/// 单个物理连接的身份信息。
///
/// 房间成员关系不在这里，由房间注册表独占维护。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub display_name: String,
    pub language: Option<LanguageCode>,
}

impl ConnectionInfo {
    pub fn new(user_id: UserId, display_name: Option<String>, language: Option<LanguageCode>) -> Self {
        let display_name = display_name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| user_id.to_string());
        Self {
            connection_id: ConnectionId::generate(),
            user_id,
            display_name,
            language,
        }
    }

    pub fn sender(&self) -> SenderInfo {
        SenderInfo {
            id: self.user_id.clone(),
            name: self.display_name.clone(),
        }
    }
}
