//! BabelBot 对话服务 HTTP 客户端

use std::time::Duration;

use application::{BotReply, BotRequest, BotService, BotServiceError, HealthProbe};
use async_trait::async_trait;
use config::BotConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    context: ChatContext<'a>,
}

#[derive(Debug, Serialize)]
struct ChatContext<'a> {
    user_id: &'a str,
    room_key: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    session_id: String,
    message: String,
    #[serde(default)]
    execution_time_ms: u64,
}

/// 模型不可用时服务仍返回 200，只能从 `status` 字段判断
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Clone)]
pub struct HttpBotClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBotClient {
    pub fn new(config: &BotConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl BotService for HttpBotClient {
    async fn chat(&self, request: BotRequest) -> Result<BotReply, BotServiceError> {
        let body = ChatRequest {
            message: &request.message,
            session_id: request.session_id.as_deref(),
            context: ChatContext {
                user_id: request.user_id.as_str(),
                room_key: request.room.as_str(),
                language: request.language.as_str(),
            },
        };

        let response = self
            .client
            .post(format!("{}/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    BotServiceError::Timeout
                } else {
                    BotServiceError::Unavailable(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotServiceError::Unavailable(format!("HTTP {status}")));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|err| BotServiceError::Malformed(err.to_string()))?;

        Ok(BotReply {
            message: reply.message,
            session_id: reply.session_id,
            latency_ms: reply.execution_time_ms,
        })
    }
}

#[async_trait]
impl HealthProbe for HttpBotClient {
    fn name(&self) -> &'static str {
        "bot"
    }

    async fn is_healthy(&self) -> bool {
        let response = match self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            _ => return false,
        };
        match response.json::<HealthResponse>().await {
            Ok(health) => health.status == "healthy",
            Err(err) => {
                tracing::debug!(error = %err, "机器人健康检查响应无法解析");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{LanguageCode, RoomKey, UserId};
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn request(session_id: Option<&str>) -> BotRequest {
        BotRequest {
            message: "What is the curing time?".into(),
            user_id: UserId::parse("user42").unwrap(),
            room: RoomKey::parse("babelbot-user42").unwrap(),
            language: LanguageCode::parse("en").unwrap(),
            session_id: session_id.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn posts_message_with_context_and_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_json(json!({
                "message": "What is the curing time?",
                "session_id": "abc",
                "context": {"user_id": "user42", "room_key": "babelbot-user42", "language": "en"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session_id": "abc",
                "message": "About 28 days.",
                "execution_time_ms": 812
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpBotClient::with_client(reqwest::Client::new(), &server.uri());
        let reply = client.chat(request(Some("abc"))).await.unwrap();

        assert_eq!(reply.message, "About 28 days.");
        assert_eq!(reply.session_id, "abc");
        assert_eq!(reply.latency_ms, 812);
    }

    #[tokio::test]
    async fn first_turn_omits_session_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_json(json!({
                "message": "What is the curing time?",
                "context": {"user_id": "user42", "room_key": "babelbot-user42", "language": "en"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session_id": "new-session",
                "message": "Hi!",
                "execution_time_ms": 5
            })))
            .mount(&server)
            .await;

        let client = HttpBotClient::with_client(reqwest::Client::new(), &server.uri());
        let reply = client.chat(request(None)).await.unwrap();
        assert_eq!(reply.session_id, "new-session");
    }

    #[tokio::test]
    async fn error_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = HttpBotClient::with_client(reqwest::Client::new(), &server.uri());
        let err = client.chat(request(None)).await.unwrap_err();
        assert!(matches!(err, BotServiceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn unexpected_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "?"})))
            .mount(&server)
            .await;

        let client = HttpBotClient::with_client(reqwest::Client::new(), &server.uri());
        let err = client.chat(request(None)).await.unwrap_err();
        assert!(matches!(err, BotServiceError::Malformed(_)));
    }

    #[tokio::test]
    async fn health_probe_uses_health_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
            .mount(&server)
            .await;

        let client = HttpBotClient::with_client(reqwest::Client::new(), &server.uri());
        assert!(client.is_healthy().await);
    }

    #[tokio::test]
    async fn degraded_status_is_unhealthy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "degraded",
                "service": "babelbot-agent",
                "gemini_available": false,
                "active_sessions": 0
            })))
            .mount(&server)
            .await;

        let client = HttpBotClient::with_client(reqwest::Client::new(), &server.uri());
        assert!(!client.is_healthy().await);
    }

    #[tokio::test]
    async fn health_body_without_status_is_unhealthy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = HttpBotClient::with_client(reqwest::Client::new(), &server.uri());
        assert!(!client.is_healthy().await);
    }
}
