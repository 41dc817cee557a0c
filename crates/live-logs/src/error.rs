//! Error types for the live log pipeline.
//!
//! Conditions inside the pipeline (inactive channels, malformed records,
//! subscription churn) are absorbed locally and never surface here. These
//! errors come from the edges: configuration, transport subscription,
//! decoding and the driver handle.

use thiserror::Error;

use crate::types::ChannelKind;

/// Errors that can occur around the live log pipeline.
#[derive(Debug, Error)]
pub enum LiveLogsError {
    /// The configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The transport refused a subscription.
    #[error("{kind} subscription failed: {reason}")]
    Subscribe {
        /// Channel that tried to subscribe.
        kind: ChannelKind,
        /// Transport-provided reason.
        reason: String,
    },

    /// A record or configuration document could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The session driver has shut down.
    #[error("log session closed")]
    SessionClosed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for live log operations.
pub type Result<T> = std::result::Result<T, LiveLogsError>;
