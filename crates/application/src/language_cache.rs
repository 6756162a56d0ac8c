//! 目标语言缓存
//!
//! 进程内共享的“当前在用语言”集合。过期后由第一个调用者同步刷新，
//! 其余并发调用者直接拿到旧快照；刷新失败时继续提供旧数据，从不向调用方报错。

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use domain::{LanguageCode, RepositoryError, Timestamp};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{clock::Clock, repository::MessageStore};

#[derive(Debug, Clone)]
pub struct LanguageCacheConfig {
    pub fallback: LanguageCode,
    pub ttl: Duration,
    pub refresh_timeout: Duration,
}

impl Default for LanguageCacheConfig {
    fn default() -> Self {
        Self {
            fallback: LanguageCode::fallback(),
            ttl: Duration::from_secs(300),
            refresh_timeout: Duration::from_secs(5),
        }
    }
}

struct Snapshot {
    languages: Arc<BTreeSet<LanguageCode>>,
    refreshed_at: Option<Timestamp>,
}

pub struct TargetLanguageCache {
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
    config: LanguageCacheConfig,
    snapshot: RwLock<Snapshot>,
    refreshing: AtomicBool,
}

/// 同一时刻只允许一个刷新，离开作用域（包括被取消）时释放。
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TargetLanguageCache {
    pub fn new(
        store: Arc<dyn MessageStore>,
        clock: Arc<dyn Clock>,
        config: LanguageCacheConfig,
    ) -> Self {
        let initial = BTreeSet::from([config.fallback.clone()]);
        Self {
            store,
            clock,
            config,
            snapshot: RwLock::new(Snapshot {
                languages: Arc::new(initial),
                refreshed_at: None,
            }),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn fallback(&self) -> &LanguageCode {
        &self.config.fallback
    }

    /// 当前目标语言集合，始终非空且包含默认语言。
    pub async fn get(&self) -> Arc<BTreeSet<LanguageCode>> {
        let (languages, stale) = {
            let snapshot = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
            (
                Arc::clone(&snapshot.languages),
                self.is_stale(snapshot.refreshed_at),
            )
        };
        if !stale {
            return languages;
        }

        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            debug!("语言缓存正在由其他任务刷新，返回旧快照");
            return languages;
        };

        match self.reload().await {
            Ok(fresh) => fresh,
            Err(_) => languages,
        }
    }

    /// 强制刷新；已有刷新进行中时直接跳过并返回 `Ok(None)`。
    pub async fn refresh(&self) -> Result<Option<Arc<BTreeSet<LanguageCode>>>, RepositoryError> {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            return Ok(None);
        };
        self.reload().await.map(Some)
    }

    /// 按固定间隔强制刷新的后台任务
    pub fn spawn_refresher(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                // 失败已在 reload 中记录
                let _ = self.refresh().await;
            }
        })
    }

    fn is_stale(&self, refreshed_at: Option<Timestamp>) -> bool {
        match refreshed_at {
            None => true,
            Some(at) => {
                let elapsed = (self.clock.now() - at).to_std().unwrap_or(Duration::ZERO);
                elapsed >= self.config.ttl
            }
        }
    }

    async fn reload(&self) -> Result<Arc<BTreeSet<LanguageCode>>, RepositoryError> {
        let result = tokio::time::timeout(self.config.refresh_timeout, self.store.active_languages())
            .await
            .unwrap_or_else(|_| Err(RepositoryError::storage("active language query timed out")));

        match result {
            Ok(codes) => {
                let mut languages: BTreeSet<LanguageCode> = codes.into_iter().collect();
                languages.insert(self.config.fallback.clone());
                let languages = Arc::new(languages);

                let mut snapshot = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
                snapshot.languages = Arc::clone(&languages);
                snapshot.refreshed_at = Some(self.clock.now());
                info!(count = languages.len(), "目标语言缓存已刷新");
                Ok(languages)
            }
            Err(err) => {
                warn!(error = %err, "目标语言缓存刷新失败，继续使用旧数据");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockMessageStore;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct ManualClock(Mutex<Timestamp>);

    impl ManualClock {
        fn new() -> Self {
            Self(Mutex::new(chrono::Utc::now()))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += chrono::Duration::from_std(by).unwrap();
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Timestamp {
            *self.0.lock().unwrap()
        }
    }

    fn code(value: &str) -> LanguageCode {
        LanguageCode::parse(value).unwrap()
    }

    fn codes(values: &[&str]) -> BTreeSet<LanguageCode> {
        values.iter().map(|v| code(v)).collect()
    }

    #[tokio::test]
    async fn first_get_refreshes_and_forces_fallback() {
        let mut store = MockMessageStore::new();
        store
            .expect_active_languages()
            .times(1)
            .returning(|| Ok(vec![code("he"), code("ru")]));

        let cache = TargetLanguageCache::new(
            Arc::new(store),
            Arc::new(ManualClock::new()),
            LanguageCacheConfig::default(),
        );

        assert_eq!(*cache.get().await, codes(&["en", "he", "ru"]));
        // TTL 内不再查询
        assert_eq!(*cache.get().await, codes(&["en", "he", "ru"]));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut store = MockMessageStore::new();
        let counter = Arc::clone(&calls);
        store.expect_active_languages().returning(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![code("en"), code("he")])
            } else {
                Err(RepositoryError::storage("connection refused"))
            }
        });

        let clock = Arc::new(ManualClock::new());
        let cache = TargetLanguageCache::new(
            Arc::new(store),
            clock.clone(),
            LanguageCacheConfig::default(),
        );

        assert_eq!(*cache.get().await, codes(&["en", "he"]));

        clock.advance(Duration::from_secs(301));
        assert_eq!(*cache.get().await, codes(&["en", "he"]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // 失败不重置时间戳，下一次调用会再次尝试
        assert_eq!(*cache.get().await, codes(&["en", "he"]));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failure_before_any_refresh_serves_fallback_only() {
        let mut store = MockMessageStore::new();
        store
            .expect_active_languages()
            .returning(|| Err(RepositoryError::storage("down")));

        let cache = TargetLanguageCache::new(
            Arc::new(store),
            Arc::new(ManualClock::new()),
            LanguageCacheConfig::default(),
        );

        assert_eq!(*cache.get().await, codes(&["en"]));
    }

    #[tokio::test]
    async fn expired_cache_picks_up_new_languages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut store = MockMessageStore::new();
        store.expect_active_languages().returning(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![code("he")])
            } else {
                Ok(vec![code("he"), code("ar")])
            }
        });

        let clock = Arc::new(ManualClock::new());
        let cache = TargetLanguageCache::new(
            Arc::new(store),
            clock.clone(),
            LanguageCacheConfig::default(),
        );

        assert_eq!(*cache.get().await, codes(&["en", "he"]));
        clock.advance(Duration::from_secs(60));
        assert_eq!(*cache.get().await, codes(&["en", "he"]));
        clock.advance(Duration::from_secs(300));
        assert_eq!(*cache.get().await, codes(&["ar", "en", "he"]));
    }

    #[tokio::test]
    async fn refresh_skips_while_another_refresh_runs() {
        let store = MockMessageStore::new();
        let cache = TargetLanguageCache::new(
            Arc::new(store),
            Arc::new(ManualClock::new()),
            LanguageCacheConfig::default(),
        );

        let _held = RefreshGuard::acquire(&cache.refreshing).unwrap();
        assert_eq!(cache.refresh().await, Ok(None));
        // 其他任务刷新时 get 直接返回旧快照，不查询存储
        assert_eq!(*cache.get().await, codes(&["en"]));
    }
}
