//! Transport seam: the collaborator that owns the physical channel.
//!
//! Establishing the channel (device discovery, bonding, service discovery,
//! subscribing to notifications) is outside this crate. A transport
//! exposes a write primitive for the request channel and a one-shot
//! payload-ceiling exchange. Response notifications are delivered through
//! an `mpsc` queue handed to the connection at construction: one queue per
//! connection, consumed by a single reassembly task, so notification
//! callbacks never touch connection state directly.

use async_trait::async_trait;

mod channel;

pub use channel::ChannelTransport;

/// A narrow, asymmetric byte channel pair.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one frame-sized message to the request channel.
    ///
    /// A single write is a single transport message; the frame boundary is
    /// the message boundary. The implementation must not fragment or
    /// coalesce writes.
    async fn write(&self, data: &[u8]) -> std::io::Result<()>;

    /// Ask the transport for a larger per-message payload ceiling.
    ///
    /// Returns the granted ceiling in bytes, with transport-level header
    /// overhead already subtracted. Transports without negotiation support
    /// return an error and the connection keeps its conservative default.
    async fn request_max_payload(&self, desired: usize) -> std::io::Result<usize>;
}
