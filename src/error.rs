//! Error types for pulse sources.

use thiserror::Error;

/// Errors that can occur while subscribed to an upstream pulse stream.
///
/// All variants are recoverable from the supervisor's point of view:
/// `Malformed` is handled inside the subscription loop (logged, counted,
/// dropped), while the others end the current session and trigger a
/// reconnect with backoff.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connecting to the upstream failed, or the connection broke mid-stream.
    #[error("connecting to upstream failed: {0}")]
    Connect(String),

    /// Sending a command to the upstream failed.
    #[error("sending to upstream failed: {0}")]
    Send(String),

    /// A payload did not parse as the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The upstream closed the stream cleanly.
    #[error("upstream closed the stream")]
    Closed,
}
