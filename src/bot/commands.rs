//! Command Dispatch
//!
//! Prefix-delimited chat commands resolved against a closed set of variants.
//! `dispatch` is pure apart from the `setprefix` mutation: it returns the
//! reply to send (and an optional presence update) and performs no I/O, so
//! the caller owns every side effect.

use super::replies::{self, RuntimeStats};
use super::state::BotState;

/// Chat presence to flip before replying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Composing,
    Recording,
}

/// The outcome of a dispatched command: at most one presence update followed
/// by exactly one outbound reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub presence: Option<Presence>,
    pub reply: String,
}

impl Dispatch {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            presence: None,
            reply: text.into(),
        }
    }
}

/// The full command surface. Fixed at compile time — unknown input maps to
/// `Unrecognized`, which dispatches to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Menu,
    Ping,
    Alive,
    SetPrefix,
    Typing,
    Recording,
    Sticker,
    Help,
    Owner,
    Info,
    Unrecognized,
}

impl Command {
    /// Resolve an already case-folded command token.
    pub fn parse(token: &str) -> Self {
        match token {
            "menu" => Self::Menu,
            "ping" => Self::Ping,
            "alive" => Self::Alive,
            "setprefix" => Self::SetPrefix,
            "typing" => Self::Typing,
            "recording" => Self::Recording,
            "sticker" => Self::Sticker,
            "help" => Self::Help,
            "owner" => Self::Owner,
            "info" => Self::Info,
            _ => Self::Unrecognized,
        }
    }
}

/// Dispatch one inbound text. Returns `None` when nothing should happen:
/// text without the current prefix, a bare prefix, or an unrecognized
/// command — all no-ops by design, not errors.
pub fn dispatch(state: &BotState, text: &str) -> Option<Dispatch> {
    let prefix = state.prefix();
    let body = text.strip_prefix(prefix.as_str())?;

    let mut tokens = body.split_whitespace();
    let command = Command::parse(&tokens.next()?.to_ascii_lowercase());
    let args: Vec<&str> = tokens.collect();

    match command {
        Command::Unrecognized => None,
        Command::Menu => Some(Dispatch::reply(replies::menu_text(state.name(), &prefix))),
        Command::Ping => Some(Dispatch::reply("Pong! 🏓")),
        Command::Alive => Some(Dispatch::reply(replies::alive_text(state.name()))),
        Command::SetPrefix => Some(set_prefix(state, &prefix, &args)),
        Command::Typing => Some(Dispatch {
            presence: Some(Presence::Composing),
            reply: "Typing indicator activated!".to_string(),
        }),
        Command::Recording => Some(Dispatch {
            presence: Some(Presence::Recording),
            reply: "Recording indicator activated!".to_string(),
        }),
        Command::Sticker => Some(Dispatch::reply(format!(
            "Reply to an image with {prefix}sticker to create a sticker!"
        ))),
        Command::Help => Some(Dispatch::reply(replies::help_text(state.name(), &prefix))),
        Command::Owner => Some(Dispatch::reply(replies::owner_text(state.name()))),
        Command::Info => Some(Dispatch::reply(replies::info_text(
            state.name(),
            &RuntimeStats::sample(state.started()),
        ))),
    }
}

/// `setprefix <char>`: mutate through the one setter, or hint usage without
/// touching anything. split_whitespace guarantees args are non-empty strings.
fn set_prefix(state: &BotState, current: &str, args: &[&str]) -> Dispatch {
    if let Some(new_prefix) = args.first()
        && state.set_prefix(new_prefix)
    {
        return Dispatch::reply(format!("Prefix changed to: {new_prefix}"));
    }
    Dispatch::reply(format!(
        "Please provide a prefix. Example: {current}setprefix !"
    ))
}
