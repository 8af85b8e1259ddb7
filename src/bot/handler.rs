//! Inbound Message Screening
//!
//! Turns raw protocol message events into the small `InboundMessage` the
//! dispatcher works with. Own echoes and payloads without text are dropped
//! here, before dispatch.

use wacore::types::message::MessageInfo;
use wacore_binary::jid::Jid;
use waproto::whatsapp::Message;

/// A screened inbound text message. Ephemeral — built per event, never stored.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Sender JID as a string (phone@s.whatsapp.net)
    pub sender: String,
    /// Chat to reply into (DM or group JID)
    pub chat: Jid,
    pub text: String,
}

/// Unwrap nested message wrappers (device_sent, ephemeral, view_once, etc.)
/// Returns the innermost Message that contains actual content.
fn unwrap_message(msg: &Message) -> &Message {
    if let Some(ref dsm) = msg.device_sent_message
        && let Some(ref inner) = dsm.message
    {
        return unwrap_message(inner);
    }
    if let Some(ref eph) = msg.ephemeral_message
        && let Some(ref inner) = eph.message
    {
        return unwrap_message(inner);
    }
    if let Some(ref vo) = msg.view_once_message
        && let Some(ref inner) = vo.message
    {
        return unwrap_message(inner);
    }
    if let Some(ref dwc) = msg.document_with_caption_message
        && let Some(ref inner) = dwc.message
    {
        return unwrap_message(inner);
    }
    msg
}

/// Extract plain text from a WhatsApp message.
fn extract_text(msg: &Message) -> Option<String> {
    let msg = unwrap_message(msg);
    if let Some(ref conv) = msg.conversation
        && !conv.is_empty()
    {
        return Some(conv.clone());
    }
    if let Some(ref ext) = msg.extended_text_message
        && let Some(ref text) = ext.text
        && !text.is_empty()
    {
        return Some(text.clone());
    }
    None
}

/// Whether an event should be dropped before dispatch: our own echoes and
/// messages without any text content never reach the command table.
fn should_discard(is_from_me: bool, text: Option<&str>) -> bool {
    is_from_me || text.is_none_or(str::is_empty)
}

/// Screen a raw message event. Returns `None` for anything the dispatcher
/// must never see.
pub fn screen(msg: &Message, info: &MessageInfo) -> Option<InboundMessage> {
    let text = extract_text(msg);
    if should_discard(info.source.is_from_me, text.as_deref()) {
        tracing::debug!(
            "WhatsApp: discarding message from {} (from_me={}, has_text={})",
            info.source.sender,
            info.source.is_from_me,
            text.is_some(),
        );
        return None;
    }

    Some(InboundMessage {
        sender: info.source.sender.to_string(),
        chat: info.source.chat.clone(),
        text: text.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_conversation() {
        let msg = Message {
            conversation: Some("hello".to_string()),
            ..Default::default()
        };
        assert_eq!(extract_text(&msg), Some("hello".to_string()));
    }

    #[test]
    fn test_extract_text_extended() {
        let msg = Message {
            extended_text_message: Some(Box::new(
                waproto::whatsapp::message::ExtendedTextMessage {
                    text: Some(".ping".to_string()),
                    ..Default::default()
                },
            )),
            ..Default::default()
        };
        assert_eq!(extract_text(&msg), Some(".ping".to_string()));
    }

    #[test]
    fn test_extract_text_unwraps_ephemeral() {
        let inner = Message {
            conversation: Some(".menu".to_string()),
            ..Default::default()
        };
        let msg = Message {
            ephemeral_message: Some(Box::new(waproto::whatsapp::message::FutureProofMessage {
                message: Some(Box::new(inner)),
                ..Default::default()
            })),
            ..Default::default()
        };
        assert_eq!(extract_text(&msg), Some(".menu".to_string()));
    }

    #[test]
    fn test_extract_text_none_for_empty_message() {
        let msg = Message::default();
        assert_eq!(extract_text(&msg), None);

        let blank = Message {
            conversation: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(extract_text(&blank), None);
    }

    #[test]
    fn test_discard_own_messages() {
        assert!(should_discard(true, Some(".ping")));
        assert!(should_discard(true, None));
    }

    #[test]
    fn test_discard_textless_messages() {
        assert!(should_discard(false, None));
        assert!(should_discard(false, Some("")));
    }

    #[test]
    fn test_keep_foreign_text_messages() {
        assert!(!should_discard(false, Some(".ping")));
        assert!(!should_discard(false, Some("hello")));
    }
}
