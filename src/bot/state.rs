//! Shared Bot State
//!
//! One `BotState` per process: identity, the mutable command prefix, the
//! connection state machine, and the broadcast channel the web console
//! subscribes to. The connection supervisor is the only writer of the
//! connection state; everything else observes.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Instant;
use tokio::sync::{broadcast, watch};

/// Capacity of the control-event broadcast channel. Slow console clients
/// that fall further behind are resynced with a fresh status push.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Connection lifecycle as observed by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    AwaitingQr,
    AwaitingPairing,
    Connected,
    /// Terminal: the session was explicitly invalidated on the phone.
    /// Recovery requires a fresh pairing from the web console.
    LoggedOut,
}

/// Severity of a console log line, serialized lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Success,
    Error,
}

/// Events fanned out to web console subscribers.
///
/// `Qr` carries the raw pairing payload; the gateway renders it to a PNG
/// data URI at push time.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    Qr(String),
    Status { connected: bool },
    PairingCode { phone: String, code: String },
    Log { level: LogLevel, message: String },
}

/// Process-wide bot state shared between the supervisor, the command
/// dispatcher, and the web console.
pub struct BotState {
    name: String,
    prefix: RwLock<String>,
    started: Instant,
    connection: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ControlEvent>,
    /// Latest QR payload, buffered so console clients that attach after the
    /// QR event fired still get one (cleared on connect).
    last_qr: Mutex<Option<String>>,
    /// Phone number of the pairing flow currently in flight.
    pending_pairing: Mutex<Option<String>>,
    /// Pairing codes handed out this process, keyed by phone number.
    pairing_codes: Mutex<HashMap<String, String>>,
}

impl BotState {
    pub fn new(name: &str, prefix: &str) -> Self {
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            name: name.to_string(),
            prefix: RwLock::new(prefix.to_string()),
            started: Instant::now(),
            connection,
            events,
            last_qr: Mutex::new(None),
            pending_pairing: Mutex::new(None),
            pairing_codes: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Current command prefix.
    pub fn prefix(&self) -> String {
        self.prefix
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Change the command prefix. The only mutation path; rejects empty
    /// input so the dispatcher can rely on a non-empty prefix.
    pub fn set_prefix(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return false;
        }
        *self.prefix.write().unwrap_or_else(|e| e.into_inner()) = prefix.to_string();
        true
    }

    pub fn connection(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection() == ConnectionState::Connected
    }

    /// Transition the connection state. Supervisor-only by convention.
    pub fn set_connection(&self, state: ConnectionState) {
        self.connection.send_replace(state);
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    /// Broadcast a control event to all console subscribers. Send errors
    /// mean nobody is listening, which is fine.
    pub fn emit(&self, event: ControlEvent) {
        let _ = self.events.send(event);
    }

    pub fn emit_log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(ControlEvent::Log {
            level,
            message: message.into(),
        });
    }

    pub fn last_qr(&self) -> Option<String> {
        self.last_qr
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn buffer_qr(&self, payload: String) {
        *self.last_qr.lock().unwrap_or_else(|e| e.into_inner()) = Some(payload);
    }

    pub fn clear_qr(&self) {
        *self.last_qr.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn pending_pairing(&self) -> Option<String> {
        self.pending_pairing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_pending_pairing(&self, phone: Option<String>) {
        *self
            .pending_pairing
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = phone;
    }

    /// Remember a pairing code handed out for `phone` (transient, in-memory).
    pub fn record_pairing_code(&self, phone: &str, code: &str) {
        self.pairing_codes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(phone.to_string(), code.to_string());
    }

    pub fn pairing_code_for(&self, phone: &str) -> Option<String> {
        self.pairing_codes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(phone)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_mutation() {
        let state = BotState::new("WACRAB-MD", ".");
        assert_eq!(state.prefix(), ".");
        assert!(state.set_prefix("!"));
        assert_eq!(state.prefix(), "!");
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let state = BotState::new("WACRAB-MD", ".");
        assert!(!state.set_prefix(""));
        assert_eq!(state.prefix(), ".");
    }

    #[test]
    fn test_connection_transitions() {
        let state = BotState::new("WACRAB-MD", ".");
        assert_eq!(state.connection(), ConnectionState::Disconnected);
        assert!(!state.is_connected());

        state.set_connection(ConnectionState::AwaitingQr);
        assert_eq!(state.connection(), ConnectionState::AwaitingQr);

        state.set_connection(ConnectionState::Connected);
        assert!(state.is_connected());
    }

    #[test]
    fn test_connection_watch_observers() {
        let state = BotState::new("WACRAB-MD", ".");
        let rx = state.subscribe_connection();
        state.set_connection(ConnectionState::Connected);
        assert_eq!(*rx.borrow(), ConnectionState::Connected);
    }

    #[test]
    fn test_qr_buffer_replay_and_clear() {
        let state = BotState::new("WACRAB-MD", ".");
        assert!(state.last_qr().is_none());

        state.buffer_qr("2@abcdef".to_string());
        assert_eq!(state.last_qr().as_deref(), Some("2@abcdef"));

        state.clear_qr();
        assert!(state.last_qr().is_none());
    }

    #[test]
    fn test_pairing_code_records() {
        let state = BotState::new("WACRAB-MD", ".");
        assert!(state.pairing_code_for("15551234567").is_none());

        state.record_pairing_code("15551234567", "ABCD-1234");
        assert_eq!(
            state.pairing_code_for("15551234567").as_deref(),
            Some("ABCD-1234")
        );
    }

    #[tokio::test]
    async fn test_event_broadcast_reaches_subscribers() {
        let state = BotState::new("WACRAB-MD", ".");
        let mut rx = state.subscribe_events();

        state.emit_log(LogLevel::Info, "hello");
        match rx.recv().await {
            Ok(ControlEvent::Log { level, message }) => {
                assert_eq!(level, LogLevel::Info);
                assert_eq!(message, "hello");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
