//! Console Wire Protocol
//!
//! JSON events exchanged with the browser over the WebSocket. Server→browser
//! frames are `{"event": ..., "data": ...}`; browser→server frames are
//! `{"action": ..., ...}`.

use crate::bot::{ControlEvent, LogLevel};
use serde::{Deserialize, Serialize};

/// Server→browser event.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// PNG data URI of the current pairing QR code
    Qr(String),
    Status {
        connected: bool,
    },
    PairingCode {
        code: String,
        phone: String,
    },
    Log {
        #[serde(rename = "type")]
        level: LogLevel,
        message: String,
    },
}

impl ServerEvent {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Convert a broadcast control event into its wire form. QR payloads are
    /// rendered to a data URI here, at push time; a render failure degrades
    /// into an error log for that client instead of dropping the frame.
    pub fn from_control(event: ControlEvent) -> Self {
        match event {
            ControlEvent::Qr(payload) => match super::qr::qr_data_uri(&payload) {
                Ok(uri) => Self::Qr(uri),
                Err(e) => Self::log(LogLevel::Error, format!("Failed to render QR code: {e}")),
            },
            ControlEvent::Status { connected } => Self::Status { connected },
            ControlEvent::PairingCode { phone, code } => Self::PairingCode { code, phone },
            ControlEvent::Log { level, message } => Self::Log { level, message },
        }
    }
}

/// Browser→server action.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ClientAction {
    RequestPairing { phone: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ServerEvent::Status { connected: true })
            .expect("serialize");
        assert_eq!(json, r#"{"event":"status","data":{"connected":true}}"#);
    }

    #[test]
    fn test_pairing_code_serialization() {
        let json = serde_json::to_string(&ServerEvent::PairingCode {
            code: "ABCD-1234".to_string(),
            phone: "15551234567".to_string(),
        })
        .expect("serialize");
        assert_eq!(
            json,
            r#"{"event":"pairing-code","data":{"code":"ABCD-1234","phone":"15551234567"}}"#
        );
    }

    #[test]
    fn test_log_serialization_uses_type_key() {
        let json = serde_json::to_string(&ServerEvent::log(LogLevel::Warning, "careful"))
            .expect("serialize");
        assert_eq!(
            json,
            r#"{"event":"log","data":{"type":"warning","message":"careful"}}"#
        );
    }

    #[test]
    fn test_qr_event_from_control_is_data_uri() {
        match ServerEvent::from_control(ControlEvent::Qr("2@payload".to_string())) {
            ServerEvent::Qr(uri) => assert!(uri.starts_with("data:image/png;base64,")),
            other => panic!("expected qr event, got {:?}", other),
        }
    }

    #[test]
    fn test_request_pairing_deserialization() {
        let action: ClientAction =
            serde_json::from_str(r#"{"action":"request-pairing","phone":"15551234567"}"#)
                .expect("deserialize");
        assert_eq!(
            action,
            ClientAction::RequestPairing {
                phone: "15551234567".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result = serde_json::from_str::<ClientAction>(r#"{"action":"reboot-server"}"#);
        assert!(result.is_err());
    }
}
