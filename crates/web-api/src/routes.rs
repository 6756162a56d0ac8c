use std::sync::Arc;

use application::HealthProbe;
use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    response::Response,
    routing::get,
    Json, Router,
};
use domain::{ConnectionInfo, LanguageCode, UserId};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::{error::ApiError, state::AppState, ws_connection::WebSocketConnection};

#[derive(Debug, Deserialize)]
struct WsQuery {
    user_id: String,
    name: Option<String>,
    language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    pub status: String,
    pub translation: bool,
    pub bot: bool,
    pub connections: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LanguagesResponse {
    pub fallback: LanguageCode,
    pub languages: Vec<LanguageCode>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/languages", get(languages))
        .route("/ws", get(websocket_upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let (translation, bot, connections) = tokio::join!(
        probe(&state.translation_probe, state.health_timeout),
        probe(&state.bot_probe, state.health_timeout),
        state.registry.connection_count()
    );

    let status = if translation && bot { "ok" } else { "degraded" };
    Json(HealthReport {
        status: status.into(),
        translation,
        bot,
        connections,
    })
}

async fn probe(probe: &Arc<dyn HealthProbe>, timeout: std::time::Duration) -> bool {
    match tokio::time::timeout(timeout, probe.is_healthy()).await {
        Ok(healthy) => healthy,
        Err(_) => {
            tracing::warn!(dependency = probe.name(), "健康探测超时");
            false
        }
    }
}

async fn languages(State(state): State<AppState>) -> Json<LanguagesResponse> {
    let languages = state.language_cache.get().await;
    Json(LanguagesResponse {
        fallback: state.fallback_language().clone(),
        languages: languages.iter().cloned().collect(),
    })
}

async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = UserId::parse(query.user_id)?;
    let language = query
        .language
        .filter(|code| !code.trim().is_empty())
        .map(LanguageCode::parse)
        .transpose()?;
    let info = ConnectionInfo::new(user_id, query.name, language);

    Ok(ws.on_upgrade(move |socket| WebSocketConnection::new(socket, state, info).run()))
}
