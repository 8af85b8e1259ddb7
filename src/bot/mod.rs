//! WhatsApp Bot
//!
//! The in-repo half of the bot: shared state, inbound message screening,
//! command dispatch, canned replies, and the connection supervisor that
//! drives the external `whatsapp-rust` client.

pub mod commands;
pub mod handler;
pub mod replies;
pub mod state;
pub mod supervisor;

pub use state::{BotState, ConnectionState, ControlEvent, LogLevel};
pub use supervisor::Supervisor;
