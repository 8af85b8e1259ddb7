//! Control-Plane Gateway
//!
//! HTTP + WebSocket web console: serves the static console page, a JSON
//! status endpoint, and the realtime channel that streams QR codes,
//! connection status, pairing codes, and log lines to browsers.

pub mod events;
pub mod qr;
mod ws;

use crate::bot::{BotState, Supervisor};
use crate::config::GatewayConfig;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Shared handles every gateway request sees. Browsers observe bot state;
/// they never own any of it.
#[derive(Clone)]
pub struct GatewayContext {
    pub state: Arc<BotState>,
    pub supervisor: Arc<Supervisor>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    connected: bool,
    #[serde(rename = "botName")]
    bot_name: String,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn api_status(State(ctx): State<GatewayContext>) -> Json<StatusResponse> {
    Json(StatusResponse {
        connected: ctx.state.is_connected(),
        bot_name: ctx.state.name().to_string(),
    })
}

/// Serve the web console until the process exits.
pub async fn serve(
    config: &GatewayConfig,
    state: Arc<BotState>,
    supervisor: Arc<Supervisor>,
) -> Result<()> {
    let ctx = GatewayContext { state, supervisor };

    let app = Router::new()
        .route("/", get(index))
        .route("/api/status", get(api_status))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind web console to {addr}"))?;

    tracing::info!("🌐 Web console listening on http://{addr}");
    axum::serve(listener, app)
        .await
        .context("Web console server error")
}
