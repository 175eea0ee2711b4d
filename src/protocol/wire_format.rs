//! Wire format constants and the correlation identifier.
//!
//! A frame on the wire is:
//!
//! ```text
//! ┌────────────────────┬───────┬─────────────────┐
//! │ Correlation ID     │ Flags │ Payload         │
//! │ 16 bytes (raw)     │ 1 byte│ 0..N bytes      │
//! └────────────────────┴───────┴─────────────────┘
//! ```
//!
//! There is no payload length prefix: the transport message boundary is
//! the frame boundary (a single transport message == a single frame).

use std::fmt;

use uuid::Uuid;

/// Correlation identifier width in bytes (fixed, exactly 16).
pub const CORRELATION_ID_LEN: usize = 16;

/// Frame header size: correlation id plus the flags byte.
pub const FRAME_HEADER_SIZE: usize = CORRELATION_ID_LEN + 1;

/// Flag constants for the protocol.
pub mod flags {
    /// First frame of a message.
    pub const FIRST: u8 = 0b0000_0001;
    /// Last (terminal) frame of a message.
    pub const LAST: u8 = 0b0000_0010;
    /// Single-frame message: both `FIRST` and `LAST`.
    pub const SINGLE: u8 = FIRST | LAST;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// Opaque fixed-width token linking all frames of one request to all
/// frames of its response.
///
/// Identifiers are 16 raw bytes on the wire, generated as UUIDv4 bytes so
/// concurrent requests on one connection never collide. Text tokens are
/// never truncated into an identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId([u8; CORRELATION_ID_LEN]);

impl CorrelationId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(*Uuid::new_v4().as_bytes())
    }

    /// Create an identifier from raw bytes.
    pub const fn from_bytes(bytes: [u8; CORRELATION_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Read an identifier from the first 16 bytes of a buffer.
    ///
    /// Returns `None` if the buffer is shorter than 16 bytes.
    pub fn from_slice(buf: &[u8]) -> Option<Self> {
        let bytes: [u8; CORRELATION_ID_LEN] = buf.get(..CORRELATION_ID_LEN)?.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Raw identifier bytes as written on the wire.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; CORRELATION_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationId({self})")
    }
}
