//! WebSocket handling
//!
//! One socket per console client. Each client gets the current status (and
//! any pending QR) on attach, then a live feed of control events. The only
//! inbound action is `request-pairing`; bad input is answered with a `log`
//! error frame, never a transport error.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use super::GatewayContext;
use super::events::{ClientAction, ServerEvent};
use crate::bot::LogLevel;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(ctx): State<GatewayContext>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

/// Handle one console client connection.
async fn handle_socket(socket: WebSocket, ctx: GatewayContext) {
    let client_id = Uuid::new_v4();
    tracing::info!("console: client {client_id} connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Outbound frames funnel through one channel so the snapshot, the
    // broadcast feed, and action replies cannot interleave mid-frame.
    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(64);

    let send_task = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_tx.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("console: failed to serialize event: {e}");
                }
            }
        }
    });

    // Snapshot: current status first, then any QR still awaiting a scan.
    let _ = out_tx
        .send(ServerEvent::Status {
            connected: ctx.state.is_connected(),
        })
        .await;
    if let Some(qr) = ctx.state.last_qr() {
        let _ = out_tx.send(ServerEvent::from_control(crate::bot::ControlEvent::Qr(qr))).await;
    }

    // Live feed: forward broadcast events; a lagged receiver gets resynced
    // with a fresh status push.
    let mut events = ctx.state.subscribe_events();
    let feed_tx = out_tx.clone();
    let feed_state = ctx.state.clone();
    let feed_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if feed_tx.send(ServerEvent::from_control(event)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("console: client lagged, {missed} events dropped");
                    let resync = ServerEvent::Status {
                        connected: feed_state.is_connected(),
                    };
                    if feed_tx.send(resync).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Inbound actions.
    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_action(&text, &ctx, &out_tx).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("console: client {client_id} socket error: {e}");
                break;
            }
        }
    }

    feed_task.abort();
    send_task.abort();
    tracing::info!("console: client {client_id} disconnected");
}

/// Parse and execute one browser action. All failure modes answer with a
/// `log` error frame to this client only.
async fn handle_action(text: &str, ctx: &GatewayContext, out_tx: &mpsc::Sender<ServerEvent>) {
    let action: ClientAction = match serde_json::from_str(text) {
        Ok(action) => action,
        Err(e) => {
            tracing::debug!("console: unrecognized action: {e}");
            let _ = out_tx
                .send(ServerEvent::log(LogLevel::Error, "Unrecognized action."))
                .await;
            return;
        }
    };

    match action {
        ClientAction::RequestPairing { phone } => {
            // On success the pairing-code event (and its success log) arrive
            // through the broadcast feed once the client emits them.
            if let Err(e) = ctx.supervisor.request_pairing(&phone).await {
                let _ = out_tx
                    .send(ServerEvent::log(
                        LogLevel::Error,
                        format!("Failed to generate pairing code: {e}"),
                    ))
                    .await;
            }
        }
    }
}
