use std::sync::Arc;
use std::time::Duration;

use application::{HealthProbe, MessageFanoutService, MessageStore, TargetLanguageCache};
use domain::LanguageCode;
use infrastructure::InMemoryRoomRegistry;

#[derive(Clone)]
pub struct AppState {
    pub fanout: Arc<MessageFanoutService>,
    pub registry: Arc<InMemoryRoomRegistry>,
    pub store: Arc<dyn MessageStore>,
    pub language_cache: Arc<TargetLanguageCache>,
    pub translation_probe: Arc<dyn HealthProbe>,
    pub bot_probe: Arc<dyn HealthProbe>,
    /// 单个健康探测的超时
    pub health_timeout: Duration,
}

impl AppState {
    pub fn fallback_language(&self) -> &LanguageCode {
        self.language_cache.fallback()
    }
}
