//! Error types
//!
//! Crate-wide error enum and `Result` alias. Binary entry points wrap these
//! in `anyhow` for context-rich exits.

use thiserror::Error;

/// All errors produced by wacrab itself. Protocol-library errors are
/// stringified at the boundary since their types are not part of our API.
#[derive(Error, Debug)]
pub enum WacrabError {
    /// WhatsApp client lifecycle or send failure
    #[error("Channel error: {0}")]
    Channel(String),

    /// Web console (HTTP/WebSocket) failure
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Filesystem or socket I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WacrabError>;
