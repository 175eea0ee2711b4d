//! In-memory channel transport.
//!
//! Carries frames over tokio mpsc channels. Used by the integration tests
//! and as a reference for adapters over real write/notify channels.
//!
//! # Example
//!
//! ```
//! use bletun::transport::{ChannelTransport, Transport};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let (transport, mut written) = ChannelTransport::new(Some(512));
//!
//! transport.write(b"frame bytes").await.unwrap();
//! assert_eq!(&written.recv().await.unwrap()[..], b"frame bytes");
//!
//! assert_eq!(transport.request_max_payload(512).await.unwrap(), 512);
//! # });
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::Transport;

/// Transport whose request channel is an unbounded mpsc queue.
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<Bytes>,
    granted_max_payload: Option<usize>,
}

impl ChannelTransport {
    /// Create a transport plus the receiving end of its request channel.
    ///
    /// `granted_max_payload` is the ceiling the transport will grant
    /// during negotiation; `None` simulates a transport without
    /// negotiation support.
    pub fn new(
        granted_max_payload: Option<usize>,
    ) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (outbound, written) = mpsc::unbounded_channel();
        (
            Self {
                outbound,
                granted_max_payload,
            },
            written,
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn write(&self, data: &[u8]) -> std::io::Result<()> {
        self.outbound
            .send(Bytes::copy_from_slice(data))
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "request channel closed")
            })
    }

    async fn request_max_payload(&self, desired: usize) -> std::io::Result<usize> {
        match self.granted_max_payload {
            Some(granted) => Ok(granted.min(desired)),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "payload negotiation not supported",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_delivers_message_boundaries() {
        let (transport, mut written) = ChannelTransport::new(Some(100));

        transport.write(b"one").await.unwrap();
        transport.write(b"two").await.unwrap();

        assert_eq!(&written.recv().await.unwrap()[..], b"one");
        assert_eq!(&written.recv().await.unwrap()[..], b"two");
    }

    #[tokio::test]
    async fn test_write_after_receiver_dropped_fails() {
        let (transport, written) = ChannelTransport::new(Some(100));
        drop(written);

        let err = transport.write(b"frame").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_negotiation_grants_at_most_desired() {
        let (transport, _written) = ChannelTransport::new(Some(200));
        assert_eq!(transport.request_max_payload(512).await.unwrap(), 200);
        assert_eq!(transport.request_max_payload(100).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_negotiation_unsupported() {
        let (transport, _written) = ChannelTransport::new(None);
        assert!(transport.request_max_payload(512).await.is_err());
    }
}
