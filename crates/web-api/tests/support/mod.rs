use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use application::{
    BotReply, BotRequest, BotService, BotServiceError, Clock, FanoutConfig, HealthProbe,
    LanguageCacheConfig, MessageFanoutDependencies, MessageFanoutService, MessageStore,
    SystemClock, TargetLanguageCache, TranslationError, Translator,
};
use async_trait::async_trait;
use domain::LanguageCode;
use futures_util::{SinkExt, StreamExt};
use infrastructure::{InMemoryMessageStore, InMemoryRoomRegistry};
use serde_json::Value;
use tokio::{net::TcpListener, net::TcpStream, sync::oneshot};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 以 `{target}:{text}` 作为译文；以 `slow` 开头的文本延迟返回
pub struct PrefixTranslator;

#[async_trait]
impl Translator for PrefixTranslator {
    async fn translate(
        &self,
        text: &str,
        _source: &LanguageCode,
        target: &LanguageCode,
    ) -> Result<String, TranslationError> {
        if text.starts_with("slow") {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        Ok(format!("{target}:{text}"))
    }
}

pub struct EchoBot {
    pub available: bool,
}

#[async_trait]
impl BotService for EchoBot {
    async fn chat(&self, request: BotRequest) -> Result<BotReply, BotServiceError> {
        if !self.available {
            return Err(BotServiceError::Unavailable("offline".into()));
        }
        Ok(BotReply {
            message: format!("echo: {}", request.message),
            session_id: "session-1".into(),
            latency_ms: 1,
        })
    }
}

pub struct StaticProbe {
    pub name: &'static str,
    pub healthy: bool,
}

#[async_trait]
impl HealthProbe for StaticProbe {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn is_healthy(&self) -> bool {
        self.healthy
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<InMemoryRoomRegistry>,
    pub store: Arc<InMemoryMessageStore>,
    _shutdown: oneshot::Sender<()>,
}

pub struct TestOptions {
    pub bot_available: bool,
    pub translation_healthy: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            bot_available: true,
            translation_healthy: true,
        }
    }
}

pub async fn start_server(options: TestOptions) -> TestServer {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemoryMessageStore::new(clock.clone()));
    let registry = Arc::new(InMemoryRoomRegistry::new());
    let cache_config = LanguageCacheConfig {
        ttl: Duration::from_millis(50),
        ..LanguageCacheConfig::default()
    };
    let language_cache = Arc::new(TargetLanguageCache::new(
        store.clone(),
        clock.clone(),
        cache_config,
    ));

    let fanout = MessageFanoutService::new(
        MessageFanoutDependencies {
            store: store.clone(),
            translator: Arc::new(PrefixTranslator),
            bot: Arc::new(EchoBot {
                available: options.bot_available,
            }),
            broadcaster: registry.clone(),
            language_cache: language_cache.clone(),
            clock,
        },
        FanoutConfig::default(),
    );

    let state = AppState {
        fanout: Arc::new(fanout),
        registry: registry.clone(),
        store: store.clone() as Arc<dyn MessageStore>,
        language_cache,
        translation_probe: Arc::new(StaticProbe {
            name: "translation",
            healthy: options.translation_healthy,
        }),
        bot_probe: Arc::new(StaticProbe {
            name: "bot",
            healthy: true,
        }),
        health_timeout: Duration::from_secs(1),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = router(state);

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestServer {
        addr,
        registry,
        store,
        _shutdown: shutdown_tx,
    }
}

impl TestServer {
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self, user: &str, language: &str) -> Client {
        let url = format!(
            "ws://{}/ws?user_id={user}&name={user}&language={language}",
            self.addr
        );
        let (client, _) = connect_async(url).await.expect("websocket connect");
        client
    }

    /// 等待注册表中的连接数达到预期
    pub async fn wait_for_connections(&self, expected: usize) {
        for _ in 0..100 {
            if self.registry.connection_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {expected} connections");
    }
}

pub async fn send_json(client: &mut Client, value: Value) {
    client
        .send(TungsteniteMessage::Text(value.to_string().into()))
        .await
        .expect("send");
}

/// 读取下一个 JSON 事件，超时则失败
pub async fn next_event(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream closed")
            .expect("websocket error");
        if let TungsteniteMessage::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("json event");
        }
    }
}

/// 跳过其它类型，读取下一个指定类型的事件
pub async fn next_of_type(client: &mut Client, kind: &str) -> Value {
    loop {
        let event = next_event(client).await;
        if event["type"] == kind {
            return event;
        }
    }
}

pub async fn join(client: &mut Client, room: &str) {
    send_json(
        client,
        serde_json::json!({"type": "join-room", "payload": {"room": room}}),
    )
    .await;
    let ack = next_of_type(client, "joined-room").await;
    assert_eq!(ack["payload"]["room"], room);
}
