//! Reassembly task: regroups notification frames into complete responses.
//!
//! Notification callbacks from the transport are funneled into a single
//! inbound queue consumed by one task, so the correlation table is never
//! mutated re-entrantly from concurrent callbacks. Errors local to a
//! single frame are logged and dropped; only the queue closing (transport
//! disconnection) fails outstanding work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::TunnelError;
use crate::http::HttpResponse;
use crate::protocol::Frame;
use crate::table::{Absorbed, CorrelationTable};

/// Spawn the task that consumes notification payloads until the channel
/// closes, then marks the connection closed and drains the table with a
/// connection-lost error.
pub(crate) fn spawn_reassembly_task(
    mut notifications: mpsc::UnboundedReceiver<Bytes>,
    table: Arc<CorrelationTable>,
    closed: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(data) = notifications.recv().await {
            process_notification(&table, &data);
        }
        tracing::debug!("notification channel closed, draining pending requests");
        closed.store(true, Ordering::Release);
        table.drain_all(|| TunnelError::ConnectionLost);
    })
}

/// Handle one notification payload.
///
/// A malformed frame must never crash the connection or corrupt an
/// unrelated pending request, and a frame for an unknown identifier is
/// expected under timeout races; both are dropped.
pub(crate) fn process_notification(table: &CorrelationTable, data: &[u8]) {
    let frame = match Frame::decode(data) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(error = %err, "dropping malformed frame");
            return;
        }
    };

    match table.absorb(&frame) {
        Absorbed::Partial => {
            tracing::trace!(id = %frame.id, bytes = frame.payload.len(), "accumulated frame");
        }
        Absorbed::Unknown => {
            tracing::debug!(id = %frame.id, "dropping frame for unknown correlation id");
        }
        Absorbed::Complete {
            completion,
            message,
        } => {
            let result = HttpResponse::parse(&message).map_err(TunnelError::Protocol);
            // The receiver may have timed out in the same instant; the
            // entry is gone either way, so a failed send is final.
            let _ = completion.send(result);
        }
    }
}
