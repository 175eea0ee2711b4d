//! Error types for bletun.

use thiserror::Error;

use crate::protocol::CorrelationId;

/// Main error type for all tunnel operations.
///
/// Every submitted request eventually either resolves with a structured
/// response or rejects with exactly one of these kinds — never left
/// pending past the channel's teardown or the deadline.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// Transport write failure, surfaced to the caller of the failing
    /// operation.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Protocol violation (see [`ProtocolError`] for propagation rules).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No terminal frame arrived within the response deadline.
    #[error("timed out waiting for response")]
    Timeout,

    /// Operation attempted without an established channel.
    #[error("not connected")]
    NotConnected,

    /// The transport disconnected while the request was outstanding.
    #[error("connection lost")]
    ConnectionLost,
}

/// Frame- and envelope-level protocol errors.
///
/// Frame-level variants (`FrameTooShort`) are logged and dropped by the
/// reassembly task rather than surfaced, since a malformed frame may
/// belong to an unrelated or already-abandoned exchange. Envelope-level
/// variants reject the specific pending request they belong to.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame shorter than the fixed header.
    #[error("frame too short: {len} bytes, need at least {min}")]
    FrameTooShort { len: usize, min: usize },

    /// Negotiated payload ceiling leaves no room for chunk data.
    #[error("payload ceiling {max_payload} too small for the frame header")]
    PayloadTooSmall { max_payload: usize },

    /// Correlation identifier already has a pending request.
    #[error("correlation id {0} already registered")]
    DuplicateId(CorrelationId),

    /// Reassembled bytes did not parse as an HTTP response envelope.
    #[error("invalid HTTP response: {0}")]
    InvalidResponse(String),

    /// Reassembled bytes did not parse as an HTTP request envelope.
    #[error("invalid HTTP request: {0}")]
    InvalidRequest(String),
}

/// Result type alias using [`TunnelError`].
pub type Result<T> = std::result::Result<T, TunnelError>;
