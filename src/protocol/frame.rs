//! Frame struct with encode/decode.
//!
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use bletun::protocol::{flags, CorrelationId, Frame};
//! use bytes::Bytes;
//!
//! let id = CorrelationId::generate();
//! let frame = Frame::new(id, flags::SINGLE, Bytes::from_static(b"hello"));
//!
//! let wire = frame.encode();
//! let decoded = Frame::decode(&wire).unwrap();
//! assert_eq!(decoded.id, id);
//! assert!(decoded.is_first() && decoded.is_last());
//! assert_eq!(decoded.payload(), b"hello");
//! ```

use bytes::Bytes;

use super::wire_format::{flags, CorrelationId, FRAME_HEADER_SIZE};
use crate::error::ProtocolError;

/// One transport-level message: correlation identifier, flags, payload.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Identifier linking this frame to its exchange.
    pub id: CorrelationId,
    /// Flags byte (see [`flags`]).
    pub flags: u8,
    /// Payload slice (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(id: CorrelationId, flags: u8, payload: Bytes) -> Self {
        Self { id, flags, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Check if this is the first frame of a message.
    #[inline]
    pub fn is_first(&self) -> bool {
        flags::has_flag(self.flags, flags::FIRST)
    }

    /// Check if this is the terminal frame of a message.
    #[inline]
    pub fn is_last(&self) -> bool {
        flags::has_flag(self.flags, flags::LAST)
    }

    /// Check if this frame is a complete single-frame message.
    #[inline]
    pub fn is_single(&self) -> bool {
        self.is_first() && self.is_last()
    }

    /// Total encoded size: header plus payload.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }

    /// Encode into a contiguous byte vector of exactly
    /// `16 + 1 + payload.len()` bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(self.id.as_bytes());
        buf.push(self.flags);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode a frame from one transport message.
    ///
    /// Fails with [`ProtocolError::FrameTooShort`] if the input is shorter
    /// than the fixed header; the payload is whatever remains (possibly
    /// zero length). Flag bits beyond `FIRST`/`LAST` are carried opaquely.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Err(ProtocolError::FrameTooShort {
                len: buf.len(),
                min: FRAME_HEADER_SIZE,
            });
        }

        // from_slice cannot fail past the length check above
        let id = CorrelationId::from_slice(buf).ok_or(ProtocolError::FrameTooShort {
            len: buf.len(),
            min: FRAME_HEADER_SIZE,
        })?;

        Ok(Self {
            id,
            flags: buf[FRAME_HEADER_SIZE - 1],
            payload: Bytes::copy_from_slice(&buf[FRAME_HEADER_SIZE..]),
        })
    }
}
