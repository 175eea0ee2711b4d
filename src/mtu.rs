//! MTU negotiation state.
//!
//! The transport starts at a conservative per-message payload ceiling.
//! Once per connection a larger ceiling is requested; on failure, or when
//! the transport does not support negotiation, the conservative default
//! stays in force. The fragmentation path always reads the *current*
//! value at send time — negotiation may complete asynchronously after the
//! connection is nominally open.

use tokio::sync::OnceCell;

use crate::transport::Transport;

/// Payload ceiling assumed before negotiation completes (the transport's
/// documented minimum).
pub const DEFAULT_MAX_PAYLOAD: usize = 20;

/// Ceiling requested from the transport during negotiation.
pub const PREFERRED_MAX_PAYLOAD: usize = 512;

/// Per-connection negotiated payload ceiling.
pub struct MtuState {
    negotiated: OnceCell<usize>,
    preferred: usize,
}

impl MtuState {
    /// State that will request `preferred` bytes when first asked.
    pub fn new(preferred: usize) -> Self {
        Self {
            negotiated: OnceCell::new(),
            preferred,
        }
    }

    /// The current payload ceiling: the negotiated value once settled,
    /// the conservative default until then.
    pub fn current(&self) -> usize {
        self.negotiated
            .get()
            .copied()
            .unwrap_or(DEFAULT_MAX_PAYLOAD)
    }

    /// Negotiate once per connection and return the settled ceiling.
    ///
    /// Later calls are no-ops returning the already-settled value. A
    /// grant smaller than the default is ignored.
    pub async fn negotiate(&self, transport: &dyn Transport) -> usize {
        *self
            .negotiated
            .get_or_init(|| async {
                match transport.request_max_payload(self.preferred).await {
                    Ok(granted) if granted > DEFAULT_MAX_PAYLOAD => {
                        tracing::debug!(granted, "negotiated payload ceiling");
                        granted
                    }
                    Ok(granted) => {
                        tracing::debug!(granted, "grant not larger than default, keeping minimum");
                        DEFAULT_MAX_PAYLOAD
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "payload negotiation failed, keeping minimum");
                        DEFAULT_MAX_PAYLOAD
                    }
                }
            })
            .await
    }
}

impl Default for MtuState {
    fn default() -> Self {
        Self::new(PREFERRED_MAX_PAYLOAD)
    }
}
