//! Correlation table: pending requests keyed by correlation identifier.
//!
//! The table is the single shared mutable resource of a connection. It is
//! guarded by a `std::sync::Mutex` that is never held across an await
//! point; the reassembly step that mutates an entry's buffer happens
//! entirely inside [`CorrelationTable::absorb`]. The table is scoped to
//! one connection's lifetime, never shared process-wide.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::{Bytes, BytesMut};
use tokio::sync::oneshot;

use crate::error::{ProtocolError, TunnelError};
use crate::http::HttpResponse;
use crate::protocol::{CorrelationId, Frame};

/// Completion handle for one pending request, resolved by the reassembly
/// task or rejected by the timeout/drain paths.
pub(crate) type Completion = oneshot::Sender<Result<HttpResponse, TunnelError>>;

/// A request awaiting its reassembled response.
struct PendingEntry {
    completion: Completion,
    buffer: BytesMut,
}

/// Outcome of absorbing one frame into the table.
pub(crate) enum Absorbed {
    /// Frame accumulated; more frames expected for this identifier.
    Partial,
    /// No entry for this identifier; the frame must be dropped. Expected
    /// under timeout races and after cancellation.
    Unknown,
    /// Terminal frame: the entry was removed and the completed message
    /// handed back for parsing outside the lock.
    Complete {
        completion: Completion,
        message: Bytes,
    },
}

/// Mapping from correlation identifier to pending request state.
pub(crate) struct CorrelationTable {
    entries: Mutex<HashMap<CorrelationId, PendingEntry>>,
}

impl CorrelationTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a pending request under `id`.
    ///
    /// Fails with [`ProtocolError::DuplicateId`] if `id` already has an
    /// entry; exactly one pending request exists per identifier at a time.
    pub(crate) fn register(
        &self,
        id: CorrelationId,
        completion: Completion,
    ) -> Result<(), ProtocolError> {
        let mut entries = self.entries.lock().expect("correlation table poisoned");
        if entries.contains_key(&id) {
            return Err(ProtocolError::DuplicateId(id));
        }
        entries.insert(
            id,
            PendingEntry {
                completion,
                buffer: BytesMut::new(),
            },
        );
        Ok(())
    }

    /// Apply one received frame to the entry it correlates with.
    ///
    /// A FIRST frame resets the accumulation buffer to this frame's
    /// payload, discarding any stale partial message left by a prior
    /// abandoned send under the same identifier. Other frames append in
    /// arrival order. A LAST frame removes the entry and returns the
    /// completed message.
    pub(crate) fn absorb(&self, frame: &Frame) -> Absorbed {
        let mut entries = self.entries.lock().expect("correlation table poisoned");

        let Some(entry) = entries.get_mut(&frame.id) else {
            return Absorbed::Unknown;
        };

        if frame.is_first() {
            entry.buffer.clear();
        }
        entry.buffer.extend_from_slice(frame.payload());

        if frame.is_last() {
            let entry = entries.remove(&frame.id).expect("entry present");
            Absorbed::Complete {
                completion: entry.completion,
                message: entry.buffer.freeze(),
            }
        } else {
            Absorbed::Partial
        }
    }

    /// Remove the entry for `id`, dropping its completion handle.
    ///
    /// Returns `true` if an entry was present. Used by the timeout and
    /// cancellation paths; a subsequent frame for `id` is then treated as
    /// unknown.
    pub(crate) fn remove(&self, id: CorrelationId) -> bool {
        self.entries
            .lock()
            .expect("correlation table poisoned")
            .remove(&id)
            .is_some()
    }

    /// Reject every pending entry with a fresh error from `make_err` and
    /// empty the table. Used on transport disconnection.
    pub(crate) fn drain_all(&self, make_err: impl Fn() -> TunnelError) {
        let entries: Vec<PendingEntry> = {
            let mut map = self.entries.lock().expect("correlation table poisoned");
            map.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries {
            // Receiver may already be gone; nothing further to do then.
            let _ = entry.completion.send(Err(make_err()));
        }
    }

    /// Number of requests currently pending.
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().expect("correlation table poisoned").len()
    }

    pub(crate) fn contains(&self, id: CorrelationId) -> bool {
        self.entries
            .lock()
            .expect("correlation table poisoned")
            .contains_key(&id)
    }
}
