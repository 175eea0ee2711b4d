//! Connection: the caller-facing send path and request lifecycle.
//!
//! One connection drives one synchronous send path (the caller blocks
//! until every frame of its request is written) and one independent
//! receive task fed by the notification queue. Multiple requests may be
//! pending concurrently; the correlation table keeps them isolated, but
//! the remote peer may still process them one at a time, so concurrent
//! callers get safety rather than guaranteed parallel throughput.
//!
//! # Example
//!
//! ```ignore
//! use bletun::{Connection, HttpRequest};
//!
//! let connection = Connection::builder()
//!     .response_timeout(std::time::Duration::from_secs(10))
//!     .connect(transport, notifications);
//!
//! let response = connection.fetch(&HttpRequest::get("/status")).await?;
//! assert_eq!(response.status, 200);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Result, TunnelError};
use crate::http::{HttpRequest, HttpResponse};
use crate::mtu::{MtuState, PREFERRED_MAX_PAYLOAD};
use crate::protocol::{fragment, CorrelationId};
use crate::reassembly::spawn_reassembly_task;
use crate::table::CorrelationTable;
use crate::transport::Transport;

/// Default deadline for a complete response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pause between frame writes.
///
/// The write channel has no flow control; this throttle compensates for
/// that on constrained links, where back-to-back writes risk silently
/// dropped or corrupted frames. It is not an acknowledgement.
pub const DEFAULT_WRITE_DELAY: Duration = Duration::from_millis(20);

/// Builder for configuring a [`Connection`].
pub struct ConnectionBuilder {
    response_timeout: Duration,
    write_delay: Duration,
    preferred_max_payload: usize,
}

impl ConnectionBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            write_delay: DEFAULT_WRITE_DELAY,
            preferred_max_payload: PREFERRED_MAX_PAYLOAD,
        }
    }

    /// Set the per-request response deadline. Default: 30 seconds.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the inter-write throttle. Default: 20 ms.
    pub fn write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    /// Set the payload ceiling requested during negotiation. Default: 512.
    pub fn preferred_max_payload(mut self, max_payload: usize) -> Self {
        self.preferred_max_payload = max_payload;
        self
    }

    /// Attach the transport and its notification queue, starting the
    /// reassembly task.
    pub fn connect(
        self,
        transport: Arc<dyn Transport>,
        notifications: mpsc::UnboundedReceiver<Bytes>,
    ) -> Connection {
        let table = Arc::new(CorrelationTable::new());
        let closed = Arc::new(AtomicBool::new(false));
        let reassembly_task =
            spawn_reassembly_task(notifications, table.clone(), closed.clone());

        Connection {
            transport,
            table,
            mtu: MtuState::new(self.preferred_max_payload),
            response_timeout: self.response_timeout,
            write_delay: self.write_delay,
            closed,
            reassembly_task,
        }
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A live tunnel over one established channel pair.
///
/// Owns the correlation table, the negotiated payload ceiling, and the
/// reassembly task; all of it is torn down when the connection is closed
/// or dropped, failing any still-pending requests.
pub struct Connection {
    transport: Arc<dyn Transport>,
    table: Arc<CorrelationTable>,
    mtu: MtuState,
    response_timeout: Duration,
    write_delay: Duration,
    closed: Arc<AtomicBool>,
    reassembly_task: JoinHandle<()>,
}

impl Connection {
    /// Create a connection builder.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Attach with default settings.
    pub fn connect(
        transport: Arc<dyn Transport>,
        notifications: mpsc::UnboundedReceiver<Bytes>,
    ) -> Self {
        ConnectionBuilder::new().connect(transport, notifications)
    }

    /// Send an HTTP request and suspend until the complete response
    /// arrives, the deadline expires, or the connection is lost.
    ///
    /// The request is fragmented at the transport's current payload
    /// ceiling and written frame by frame with the configured throttle;
    /// this method does not return early once writing succeeds — it waits
    /// for the reassembled response.
    ///
    /// Dropping the returned future cancels the wait and forgets the
    /// pending entry. Cancellation means "stop waiting": frames already
    /// written cannot be retracted and the remote peer may still process
    /// the request.
    pub async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TunnelError::NotConnected);
        }

        // Reads the ceiling settled *now*, not at connection open.
        let max_payload = self.mtu.negotiate(self.transport.as_ref()).await;

        let id = CorrelationId::generate();
        let (completion, response) = oneshot::channel();
        self.table.register(id, completion)?;
        let mut guard = EntryGuard::new(&self.table, id);

        let frames = fragment(id, &request.serialize(), max_payload)?;
        for (i, frame) in frames.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.write_delay).await;
            }
            self.transport.write(&frame.encode()).await?;
        }
        tracing::debug!(%id, frames = frames.len(), "request written");

        match tokio::time::timeout(self.response_timeout, response).await {
            Ok(Ok(result)) => {
                // Resolved or rejected by the reassembly task; the entry
                // is already gone.
                guard.disarm();
                result
            }
            Ok(Err(_)) => {
                // Completion dropped without a value: the entry was
                // removed out from under us (drain during teardown).
                guard.disarm();
                Err(TunnelError::ConnectionLost)
            }
            Err(_) => {
                tracing::debug!(%id, "response deadline expired");
                // Guard drop evicts the entry; later frames for this id
                // are then treated as unknown.
                Err(TunnelError::Timeout)
            }
        }
    }

    /// Number of requests currently awaiting responses.
    pub fn pending_requests(&self) -> usize {
        self.table.len()
    }

    /// Whether the notification channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Tear the connection down: stop the reassembly task and reject
    /// every outstanding request with a connection-lost error.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.reassembly_task.abort();
        self.table.drain_all(|| TunnelError::ConnectionLost);
        tracing::debug!("connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Removes a pending entry when the owning request path is abandoned
/// (timeout, write failure, or the fetch future being dropped) unless the
/// entry already completed.
struct EntryGuard<'a> {
    table: &'a CorrelationTable,
    id: CorrelationId,
    disarmed: bool,
}

impl<'a> EntryGuard<'a> {
    fn new(table: &'a CorrelationTable, id: CorrelationId) -> Self {
        Self {
            table,
            id,
            disarmed: false,
        }
    }

    /// Disarm the guard: the entry was resolved through another path.
    fn disarm(&mut self) {
        self.disarmed = true;
    }
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        if !self.disarmed {
            self.table.remove(self.id);
        }
    }
}
