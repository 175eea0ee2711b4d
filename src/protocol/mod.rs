//! Protocol module - wire format, frame codec, and fragmentation.
//!
//! This module implements the binary protocol carried over the narrow
//! channels:
//! - 17-byte frame header (16-byte correlation id + flags) encoding/decoding
//! - fragmentation of serialized messages into size-bounded frames

mod fragment;
mod frame;
mod wire_format;

pub use fragment::fragment;
pub use frame::Frame;
pub use wire_format::{flags, CorrelationId, CORRELATION_ID_LEN, FRAME_HEADER_SIZE};
