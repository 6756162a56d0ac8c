//! 基础设施层实现。
//!
//! 提供房间注册表、翻译与机器人服务的 HTTP 客户端、Postgres 与内存持久化网关，
//! 实现应用层定义的接口。

pub mod bot;
pub mod builder;
pub mod memory;
pub mod migrations;
pub mod registry;
pub mod repository;
pub mod translation;

pub use bot::HttpBotClient;
pub use builder::{Infrastructure, InfrastructureError};
pub use memory::InMemoryMessageStore;
pub use migrations::{run_migrations, MIGRATOR};
pub use registry::{EventReceiver, EventSender, InMemoryRoomRegistry};
pub use repository::{create_pg_pool, PgMessageStore};
pub use translation::HttpTranslator;
