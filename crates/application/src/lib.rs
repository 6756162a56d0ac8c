//! 应用层实现。
//!
//! 这里提供消息扇出用例服务，以及对外部协作方（持久化网关、
//! 翻译服务、机器人服务、事件广播）的抽象。

pub mod bot;
pub mod broadcaster;
pub mod clock;
pub mod error;
pub mod health;
pub mod language_cache;
pub mod repository;
pub mod services;
pub mod translator;

pub use bot::{BotReply, BotRequest, BotService, BotServiceError};
pub use broadcaster::{BroadcastError, EventBroadcaster};
pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use health::HealthProbe;
pub use language_cache::{LanguageCacheConfig, TargetLanguageCache};
pub use repository::{MessageStore, NewMessage, PrivateRoom, StoredMessage, TranslationKind};
pub use services::{
    FanoutConfig, FanoutOutcome, MessageFanoutDependencies, MessageFanoutService, BOT_APOLOGY,
};
pub use translator::{TranslationError, Translator};
