//! Web API 层。
//!
//! 提供 Axum 路由：健康检查、目标语言查询，以及承载聊天事件的 WebSocket 端点。

mod error;
mod routes;
mod state;
mod ws_connection;

pub use error::{ApiError, ErrorBody};
pub use routes::{router, HealthReport, LanguagesResponse};
pub use state::AppState;
