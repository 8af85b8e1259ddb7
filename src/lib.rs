//! WaCrab - WhatsApp Automation Bot
//!
//! A thin automation bot on top of the `whatsapp-rust` WhatsApp Web client:
//! prefix-delimited chat commands plus a web console for QR / pairing-code
//! linking and live connection status.
//!
//! ## Features
//!
//! - **Chat commands:** menu, ping, alive, setprefix, typing, recording,
//!   sticker, help, owner, info
//! - **Web console:** pairing QR code, phone-number pairing codes,
//!   connection status, and a live activity log over WebSocket
//! - **Supervised connection:** automatic reconnect with backoff; explicit
//!   logout requires re-pairing instead of looping on stale credentials
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with defaults (web console on port 3000)
//! wacrab
//!
//! # Write an editable config file first
//! wacrab init
//!
//! # Debug logging to ~/.wacrab/logs
//! wacrab --debug
//! ```

pub mod bot;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, WacrabError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
