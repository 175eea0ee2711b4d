//! Fragmentation: slice a serialized message into size-bounded frames.
//!
//! The chunk size is derived from the payload ceiling the transport
//! currently allows, minus the fixed frame header. A zero-length message
//! still produces exactly one (empty) frame so the FIRST/LAST flags can be
//! emitted.
//!
//! # Example
//!
//! ```
//! use bletun::protocol::{fragment, CorrelationId};
//!
//! let id = CorrelationId::generate();
//! let frames = fragment(id, b"GET /status HTTP/1.1\r\n\r\n", 27).unwrap();
//!
//! // 24 bytes at 10 bytes per chunk -> 3 frames
//! assert_eq!(frames.len(), 3);
//! assert!(frames[0].is_first());
//! assert!(frames[2].is_last());
//! ```

use bytes::Bytes;

use super::frame::Frame;
use super::wire_format::{flags, CorrelationId, FRAME_HEADER_SIZE};
use crate::error::ProtocolError;

/// Partition `data` into an ordered frame sequence for `id`.
///
/// `max_payload` is the transport's current per-message ceiling; each
/// frame's payload holds at most `max_payload - 17` bytes. Fails with
/// [`ProtocolError::PayloadTooSmall`] when the ceiling leaves no room for
/// chunk data.
pub fn fragment(
    id: CorrelationId,
    data: &[u8],
    max_payload: usize,
) -> Result<Vec<Frame>, ProtocolError> {
    let chunk_size = max_payload
        .checked_sub(FRAME_HEADER_SIZE)
        .filter(|size| *size > 0)
        .ok_or(ProtocolError::PayloadTooSmall { max_payload })?;

    if data.is_empty() {
        return Ok(vec![Frame::new(id, flags::SINGLE, Bytes::new())]);
    }

    let total = data.len().div_ceil(chunk_size);
    let frames = data
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, chunk)| {
            let mut frame_flags = 0;
            if i == 0 {
                frame_flags |= flags::FIRST;
            }
            if i == total - 1 {
                frame_flags |= flags::LAST;
            }
            Frame::new(id, frame_flags, Bytes::copy_from_slice(chunk))
        })
        .collect();

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(frames: &[Frame]) -> Vec<u8> {
        let mut out = Vec::new();
        for frame in frames {
            out.extend_from_slice(frame.payload());
        }
        out
    }

    #[test]
    fn test_single_frame_message() {
        let id = CorrelationId::generate();
        let frames = fragment(id, b"short", 100).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_single());
        assert_eq!(frames[0].payload(), b"short");
    }

    #[test]
    fn test_empty_message_still_produces_one_frame() {
        let id = CorrelationId::generate();
        let frames = fragment(id, b"", 100).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_single());
        assert!(frames[0].payload.is_empty());
    }

    #[test]
    fn test_exact_multiple_of_chunk_size() {
        let id = CorrelationId::generate();
        // ceiling 27 -> 10-byte chunks; 20 bytes -> exactly 2 full chunks
        let data = vec![0xCD; 20];
        let frames = fragment(id, &data, 27).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload.len(), 10);
        assert_eq!(frames[1].payload.len(), 10);
        assert!(frames[0].is_first() && !frames[0].is_last());
        assert!(frames[1].is_last() && !frames[1].is_first());
    }

    #[test]
    fn test_flags_on_middle_frames() {
        let id = CorrelationId::generate();
        let data = vec![1u8; 35];
        let frames = fragment(id, &data, 27).unwrap();

        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].flags, flags::FIRST);
        assert_eq!(frames[1].flags, 0);
        assert_eq!(frames[2].flags, 0);
        assert_eq!(frames[3].flags, flags::LAST);
    }

    #[test]
    fn test_order_and_content_preserved() {
        let id = CorrelationId::generate();
        let data: Vec<u8> = (0..=255).collect();
        let frames = fragment(id, &data, 27).unwrap();

        assert_eq!(reassemble(&frames), data);
        for frame in &frames {
            assert_eq!(frame.id, id);
            assert!(frame.payload.len() <= 10);
        }
    }

    #[test]
    fn test_payload_too_small() {
        let id = CorrelationId::generate();

        // Header alone fills the ceiling: no room for chunk data.
        let err = fragment(id, b"data", FRAME_HEADER_SIZE).unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooSmall { .. }));

        assert!(fragment(id, b"data", 0).is_err());
        assert!(fragment(id, b"data", 1).is_err());
    }

    #[test]
    fn test_smallest_usable_ceiling() {
        let id = CorrelationId::generate();
        // One byte of room per frame: every byte becomes its own frame.
        let frames = fragment(id, b"abc", FRAME_HEADER_SIZE + 1).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].payload(), b"a");
        assert_eq!(frames[2].payload(), b"c");
        assert!(frames[0].is_first());
        assert!(frames[2].is_last());
    }

    #[test]
    fn test_short_request_two_frames() {
        // 18-byte request, 10-byte chunks: 10 FIRST + 8 LAST.
        let id = CorrelationId::generate();
        let request = b"GET /status HTTP/1.1\r\n\r\n";
        assert_eq!(&request[..18], b"GET /status HTTP/1");

        let frames = fragment(id, &request[..18], 10 + FRAME_HEADER_SIZE).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload.len(), 10);
        assert_eq!(frames[0].flags, flags::FIRST);
        assert_eq!(frames[1].payload.len(), 8);
        assert_eq!(frames[1].flags, flags::LAST);
        assert_eq!(reassemble(&frames), &request[..18]);
    }

    #[test]
    fn test_round_trip_across_sizes() {
        let id = CorrelationId::generate();
        for len in [0usize, 1, 9, 10, 11, 100, 257] {
            let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let frames = fragment(id, &data, 27).unwrap();

            assert!(frames[0].is_first());
            assert!(frames.last().unwrap().is_last());
            if len <= 10 {
                assert_eq!(frames.len(), 1);
                assert!(frames[0].is_single());
            }
            assert_eq!(reassemble(&frames), data);
        }
    }
}
