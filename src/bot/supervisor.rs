//! Connection Supervisor
//!
//! Owns the single live WhatsApp client: builds it against the session
//! store, reacts to lifecycle events, and rebuilds it after unexpected
//! closure with exponential backoff. An explicit logout is terminal — the
//! client is only rebuilt again by a pairing request from the web console.

use super::commands::{self, Presence};
use super::handler;
use super::state::{BotState, ConnectionState, ControlEvent, LogLevel};
use crate::config::BotSettings;
use crate::error::{Result, WacrabError};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use wacore::types::events::Event;
use wacore::types::message::MessageInfo;
use wacore_binary::jid::Jid;
use whatsapp_rust::bot::Bot;
use whatsapp_rust::client::Client;
use whatsapp_rust::pair_code::PairCodeOptions;
use whatsapp_rust::store::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

/// Reconnect backoff bounds: 1s doubling up to 60s, reset on connect.
const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Retry delays for outbound sends: 500ms, 1s, 2s.
const RETRY_DELAYS_MS: [u64; 3] = [500, 1000, 2000];

/// How the next client instance should be built.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StartMode {
    /// Plain reconnect with whatever credentials the session store holds.
    Reconnect,
    /// Rebuild in pair-code mode for a phone number. `wipe_session` is set
    /// when the previous session was explicitly logged out and its
    /// credentials are stale.
    Pairing { phone: String, wipe_session: bool },
}

/// Exponential restart backoff. Doubles per failed cycle, capped, reset on
/// a successful connect.
#[derive(Debug)]
struct RestartBackoff {
    attempt: u32,
}

impl RestartBackoff {
    fn new() -> Self {
        Self { attempt: 0 }
    }

    fn next_delay(&mut self) -> Duration {
        let exp = self.attempt.min(6);
        self.attempt = self.attempt.saturating_add(1);
        RECONNECT_BASE_DELAY
            .saturating_mul(1 << exp)
            .min(RECONNECT_MAX_DELAY)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Whether a close in `current` state may schedule a reconnect. Logout is
/// terminal: restarting with stale credentials would loop forever.
fn should_schedule_restart(current: ConnectionState) -> bool {
    current != ConnectionState::LoggedOut
}

/// Drain queued restart requests into one winner. A pairing request beats
/// plain reconnects; among pairing requests the latest wins.
fn coalesce_restart(first: StartMode, rx: &mut mpsc::Receiver<StartMode>) -> StartMode {
    let mut winner = first;
    while let Ok(next) = rx.try_recv() {
        if matches!(next, StartMode::Pairing { .. }) || !matches!(winner, StartMode::Pairing { .. })
        {
            winner = next;
        }
    }
    winner
}

/// Supervises exactly one WhatsApp client. The run loop is the only place a
/// client is ever built, so two live clients cannot exist.
pub struct Supervisor {
    state: Arc<BotState>,
    settings: BotSettings,
    backoff: Arc<StdMutex<RestartBackoff>>,
    restart_tx: mpsc::Sender<StartMode>,
}

impl Supervisor {
    /// Start supervising: builds the first client and keeps rebuilding per
    /// the restart policy until the process exits.
    pub fn spawn(state: Arc<BotState>, settings: BotSettings) -> Arc<Self> {
        let (restart_tx, restart_rx) = mpsc::channel(8);
        let supervisor = Arc::new(Self {
            state,
            settings,
            backoff: Arc::new(StdMutex::new(RestartBackoff::new())),
            restart_tx,
        });
        tokio::spawn(supervisor.clone().run_loop(restart_rx));
        supervisor
    }

    /// Request a pairing code for a phone number (web console action).
    /// Normalizes to digits, then rebuilds the client in pair-code mode.
    /// Returns the normalized number; the code itself arrives later as a
    /// `PairingCode` control event.
    pub async fn request_pairing(&self, phone: &str) -> Result<String> {
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(WacrabError::Channel(format!(
                "invalid phone number '{phone}'"
            )));
        }
        if self.state.is_connected() {
            return Err(WacrabError::Channel(
                "already connected — unlink this device in WhatsApp before pairing again".into(),
            ));
        }

        let wipe_session = self.state.connection() == ConnectionState::LoggedOut;
        self.state.set_pending_pairing(Some(digits.clone()));
        self.restart_tx
            .send(StartMode::Pairing {
                phone: digits.clone(),
                wipe_session,
            })
            .await
            .map_err(|_| WacrabError::Channel("connection supervisor is not running".into()))?;
        self.state.set_connection(ConnectionState::AwaitingPairing);

        tracing::info!("WhatsApp: pairing requested for {digits}");
        Ok(digits)
    }

    async fn run_loop(self: Arc<Self>, mut restart_rx: mpsc::Receiver<StartMode>) {
        let mut mode = StartMode::Reconnect;
        loop {
            let mut handle = match self.build_and_run(&mode).await {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::error!("WhatsApp: client start failed: {e}");
                    self.state
                        .emit_log(LogLevel::Error, format!("Failed to start client: {e}"));
                    let delay = self.next_restart_delay();
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            // Wait for the next restart trigger: a lifecycle event asked for
            // one, or the client task ended on its own.
            let request = tokio::select! {
                request = restart_rx.recv() => match request {
                    Some(request) => request,
                    None => {
                        handle.abort();
                        return;
                    }
                },
                _ = &mut handle => {
                    if should_schedule_restart(self.state.connection()) {
                        tracing::warn!("WhatsApp: client task ended, restarting");
                        StartMode::Reconnect
                    } else {
                        // Terminal logout: only a pairing request revives us.
                        match restart_rx.recv().await {
                            Some(request) => request,
                            None => return,
                        }
                    }
                }
            };

            let request = coalesce_restart(request, &mut restart_rx);
            handle.abort();

            match &request {
                StartMode::Reconnect => {
                    let delay = self.next_restart_delay();
                    tracing::info!("WhatsApp: restarting client in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                StartMode::Pairing {
                    phone,
                    wipe_session,
                } => {
                    tracing::info!("WhatsApp: rebuilding in pair-code mode for {phone}");
                    if *wipe_session {
                        self.wipe_session();
                    }
                    self.reset_backoff();
                }
            }
            mode = request;
        }
    }

    /// Build one client against the session store and run it. The returned
    /// handle is the running client task.
    async fn build_and_run(&self, mode: &StartMode) -> Result<JoinHandle<()>> {
        let db_path = self.session_db_path()?;
        if matches!(mode, StartMode::Reconnect) && !db_path.exists() {
            tracing::info!("WhatsApp: no paired session found — pair from the web console");
        }

        let backend = Arc::new(
            SqliteStore::new(db_path.to_string_lossy().as_ref())
                .await
                .map_err(|e| WacrabError::Channel(format!("session store init failed: {e}")))?,
        );

        let state = self.state.clone();
        let backoff = self.backoff.clone();
        let restart_tx = self.restart_tx.clone();

        let mut builder = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_device_props(
                Some(self.state.name().to_string()),
                None,
                Some(waproto::whatsapp::device_props::PlatformType::Desktop),
            )
            .on_event(move |event, client| {
                let state = state.clone();
                let backoff = backoff.clone();
                let restart_tx = restart_tx.clone();
                async move {
                    handle_event(event, client, state, backoff, restart_tx).await;
                }
            });

        if let StartMode::Pairing { phone, .. } = mode {
            builder = builder.with_pair_code(PairCodeOptions {
                phone_number: phone.clone(),
                ..Default::default()
            });
        }

        let mut bot = builder
            .build()
            .await
            .map_err(|e| WacrabError::Channel(format!("client build failed: {e}")))?;

        bot.run()
            .await
            .map_err(|e| WacrabError::Channel(format!("client run failed: {e}")))
    }

    fn session_db_path(&self) -> Result<PathBuf> {
        let dir = self.settings.data_dir.join("session");
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join("wacrab.db"))
    }

    /// Delete the stale session store. The library will not generate fresh
    /// pairing material over logged-out credentials.
    fn wipe_session(&self) {
        let dir = self.settings.data_dir.join("session");
        if dir.exists() {
            tracing::info!("WhatsApp: removing stale session at {:?}", dir);
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                tracing::warn!("WhatsApp: failed to remove stale session: {e}");
            }
        }
    }

    fn next_restart_delay(&self) -> Duration {
        self.backoff
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .next_delay()
    }

    fn reset_backoff(&self) {
        self.backoff
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .reset();
    }
}

/// React to one protocol client event.
async fn handle_event(
    event: Event,
    client: Arc<Client>,
    state: Arc<BotState>,
    backoff: Arc<StdMutex<RestartBackoff>>,
    restart_tx: mpsc::Sender<StartMode>,
) {
    match event {
        Event::PairingQrCode { code, .. } => {
            tracing::info!("WhatsApp: QR code generated (scan from the web console)");
            if state.connection() != ConnectionState::AwaitingPairing {
                state.set_connection(ConnectionState::AwaitingQr);
            }
            state.buffer_qr(code.clone());
            state.emit(ControlEvent::Qr(code));
            state.emit_log(LogLevel::Info, "QR Code generated. Scan with WhatsApp.");
        }
        Event::PairingCode { code, .. } => {
            tracing::info!("WhatsApp: pairing code generated");
            let phone = state.pending_pairing().unwrap_or_default();
            state.record_pairing_code(&phone, &code);
            // The code event must reach the console before its log line.
            state.emit(ControlEvent::PairingCode {
                phone,
                code: code.clone(),
            });
            state.emit_log(LogLevel::Success, format!("Pairing code generated: {code}"));
        }
        Event::PairSuccess(_) => {
            tracing::info!("WhatsApp: pairing successful");
            state.emit_log(LogLevel::Success, "Pairing successful!");
        }
        Event::PairError(err) => {
            tracing::error!("WhatsApp: pairing failed: {:?}", err);
            state.emit_log(LogLevel::Error, format!("Pairing failed: {err:?}"));
        }
        Event::Connected(_) => {
            tracing::info!("WhatsApp: connected successfully");
            state.set_connection(ConnectionState::Connected);
            state.clear_qr();
            state.set_pending_pairing(None);
            backoff.lock().unwrap_or_else(|e| e.into_inner()).reset();
            state.emit(ControlEvent::Status { connected: true });
            state.emit_log(LogLevel::Success, "Successfully connected to WhatsApp!");
        }
        Event::Disconnected(_) => {
            tracing::warn!("WhatsApp: disconnected");
            if !should_schedule_restart(state.connection()) {
                return;
            }
            state.set_connection(ConnectionState::Disconnected);
            state.emit(ControlEvent::Status { connected: false });
            state.emit_log(LogLevel::Warning, "Connection closed. Reconnecting...");
            // One restart per close; the run loop coalesces duplicates.
            let _ = restart_tx.send(StartMode::Reconnect).await;
        }
        Event::LoggedOut(_) => {
            tracing::warn!("WhatsApp: logged out — session invalidated");
            state.set_connection(ConnectionState::LoggedOut);
            state.emit(ControlEvent::Status { connected: false });
            state.emit_log(
                LogLevel::Error,
                "Logged out. Pair again from this console to reconnect.",
            );
        }
        Event::Message(msg, info) => {
            handle_inbound(&state, &client, msg.as_ref(), &info).await;
        }
        other => {
            tracing::debug!("WhatsApp: unhandled event: {:?}", other);
        }
    }
}

/// Screen, dispatch, and execute the side effects of one inbound message:
/// at most one presence update, then exactly one reply. Failures are logged
/// here and never escape into the event loop.
async fn handle_inbound(
    state: &BotState,
    client: &Arc<Client>,
    msg: &waproto::whatsapp::Message,
    info: &MessageInfo,
) {
    let Some(inbound) = handler::screen(msg, info) else {
        return;
    };
    let Some(dispatch) = commands::dispatch(state, &inbound.text) else {
        return;
    };

    let preview: String = inbound.text.chars().take(50).collect();
    tracing::info!("WhatsApp: command from {}: {}", inbound.sender, preview);

    if let Some(presence) = dispatch.presence {
        let sent = match presence {
            Presence::Composing => client.chatstate().send_composing(&inbound.chat).await,
            Presence::Recording => client.chatstate().send_recording(&inbound.chat).await,
        };
        if sent.is_err() {
            tracing::warn!("WhatsApp: failed to send presence update to {}", inbound.chat);
        }
    }

    if let Err(e) = send_text(client, &inbound.chat, &dispatch.reply).await {
        tracing::error!("WhatsApp: failed to send reply: {e}");
    }
}

/// Send a text message with retry and exponential backoff.
async fn send_text(client: &Client, jid: &Jid, text: &str) -> Result<String> {
    let msg = waproto::whatsapp::Message {
        conversation: Some(text.to_string()),
        ..Default::default()
    };

    let mut last_err = None;
    for (attempt, delay_ms) in RETRY_DELAYS_MS.iter().enumerate() {
        match client.send_message(jid.clone(), msg.clone()).await {
            Ok(msg_id) => return Ok(msg_id),
            Err(e) => {
                let attempt_num = attempt + 1;
                if attempt_num < RETRY_DELAYS_MS.len() {
                    tracing::warn!(
                        "WhatsApp: send attempt {attempt_num}/{} failed: {e}, retrying in {delay_ms}ms",
                        RETRY_DELAYS_MS.len()
                    );
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                }
                last_err = Some(e.to_string());
            }
        }
    }

    Err(WacrabError::Channel(format!(
        "send failed after {} attempts: {}",
        RETRY_DELAYS_MS.len(),
        last_err.unwrap_or_default()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_to_cap() {
        let mut backoff = RestartBackoff::new();
        let delays: Vec<u64> = (0..8).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    }

    #[test]
    fn test_backoff_resets_on_success() {
        let mut backoff = RestartBackoff::new();
        let _ = backoff.next_delay();
        let _ = backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_logout_is_terminal() {
        assert!(should_schedule_restart(ConnectionState::Disconnected));
        assert!(should_schedule_restart(ConnectionState::Connected));
        assert!(should_schedule_restart(ConnectionState::AwaitingQr));
        assert!(should_schedule_restart(ConnectionState::AwaitingPairing));
        assert!(!should_schedule_restart(ConnectionState::LoggedOut));
    }

    #[tokio::test]
    async fn test_single_close_yields_single_restart() {
        let (tx, mut rx) = mpsc::channel::<StartMode>(8);
        tx.send(StartMode::Reconnect).await.expect("send");

        let first = rx.recv().await.expect("one restart request");
        let winner = coalesce_restart(first, &mut rx);
        assert_eq!(winner, StartMode::Reconnect);
        // Nothing else queued: the close produced exactly one restart.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pairing_request_outranks_reconnects() {
        let (tx, mut rx) = mpsc::channel::<StartMode>(8);
        tx.send(StartMode::Reconnect).await.expect("send");
        tx.send(StartMode::Pairing {
            phone: "15551234567".to_string(),
            wipe_session: false,
        })
        .await
        .expect("send");
        tx.send(StartMode::Reconnect).await.expect("send");

        let first = rx.recv().await.expect("first request");
        let winner = coalesce_restart(first, &mut rx);
        assert_eq!(
            winner,
            StartMode::Pairing {
                phone: "15551234567".to_string(),
                wipe_session: false,
            }
        );
    }

    #[tokio::test]
    async fn test_request_pairing_rejects_garbage_numbers() {
        let state = Arc::new(BotState::new("WACRAB-MD", "."));
        let (restart_tx, _restart_rx) = mpsc::channel(8);
        let supervisor = Supervisor {
            state: state.clone(),
            settings: BotSettings::default(),
            backoff: Arc::new(StdMutex::new(RestartBackoff::new())),
            restart_tx,
        };

        assert!(supervisor.request_pairing("not-a-number").await.is_err());
        assert_eq!(state.connection(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_request_pairing_rejected_while_connected() {
        let state = Arc::new(BotState::new("WACRAB-MD", "."));
        state.set_connection(ConnectionState::Connected);
        let (restart_tx, _restart_rx) = mpsc::channel(8);
        let supervisor = Supervisor {
            state: state.clone(),
            settings: BotSettings::default(),
            backoff: Arc::new(StdMutex::new(RestartBackoff::new())),
            restart_tx,
        };

        assert!(supervisor.request_pairing("15551234567").await.is_err());
        assert_eq!(state.connection(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_request_pairing_normalizes_and_schedules() {
        let state = Arc::new(BotState::new("WACRAB-MD", "."));
        let (restart_tx, mut restart_rx) = mpsc::channel(8);
        let supervisor = Supervisor {
            state: state.clone(),
            settings: BotSettings::default(),
            backoff: Arc::new(StdMutex::new(RestartBackoff::new())),
            restart_tx,
        };

        let digits = supervisor
            .request_pairing("+1 (555) 123-4567")
            .await
            .expect("pairing request");
        assert_eq!(digits, "15551234567");
        assert_eq!(state.connection(), ConnectionState::AwaitingPairing);
        assert_eq!(state.pending_pairing().as_deref(), Some("15551234567"));

        match restart_rx.recv().await {
            Some(StartMode::Pairing { phone, wipe_session }) => {
                assert_eq!(phone, "15551234567");
                assert!(!wipe_session);
            }
            other => panic!("expected pairing start mode, got {:?}", other),
        }
    }
}
