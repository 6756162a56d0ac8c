//! 主应用程序入口
//!
//! 加载配置、装配各层组件，启动 Axum Web 服务与目标语言后台刷新任务。

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use application::{
    Clock, FanoutConfig, LanguageCacheConfig, MessageFanoutDependencies, MessageFanoutService,
    SystemClock, TargetLanguageCache,
};
use config::AppConfig;
use domain::LanguageCode;
use infrastructure::Infrastructure;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().context("加载配置失败")?;
    tracing::info!(config = %config.sanitized(), "配置已加载");

    let fallback = LanguageCode::parse(config.languages.fallback.as_str())
        .context("languages.fallback 不是有效的语言代码")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let infra = Infrastructure::connect(&config, clock.clone())
        .await
        .context("初始化基础设施失败")?;

    let language_cache = Arc::new(TargetLanguageCache::new(
        infra.store.clone(),
        clock.clone(),
        LanguageCacheConfig {
            fallback: fallback.clone(),
            ttl: Duration::from_secs(config.languages.cache_ttl_secs),
            refresh_timeout: Duration::from_secs(config.languages.refresh_timeout_secs),
        },
    ));
    let _refresher = language_cache
        .clone()
        .spawn_refresher(Duration::from_secs(config.languages.refresh_interval_secs));

    let fanout = MessageFanoutService::new(
        MessageFanoutDependencies {
            store: infra.store.clone(),
            translator: infra.translator.clone(),
            bot: infra.bot.clone(),
            broadcaster: infra.registry.clone(),
            language_cache: language_cache.clone(),
            clock,
        },
        FanoutConfig {
            fallback_language: fallback,
            translation_timeout: Duration::from_secs(config.translation.timeout_secs),
            bot_timeout: Duration::from_secs(config.bot.timeout_secs),
        },
    );

    let state = AppState {
        fanout: Arc::new(fanout),
        registry: infra.registry.clone(),
        store: infra.store.clone(),
        language_cache,
        translation_probe: infra.translator.clone(),
        bot_probe: infra.bot.clone(),
        health_timeout: Duration::from_secs(config.health.timeout_secs),
    };

    let app = router(state);
    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("无法监听 {address}"))?;

    tracing::info!("BabelChat 服务启动在 http://{address}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "无法监听退出信号");
    }
}
