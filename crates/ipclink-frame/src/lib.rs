//! Length-prefixed message framing for ipclink.
//!
//! Every envelope travels as one frame:
//! - A 2-byte magic number ("IL") for stream synchronization
//! - A 4-byte little-endian payload length
//! - The payload (a UTF-8 JSON envelope)
//!
//! [`FrameCodec`] plugs into `tokio_util::codec::Framed`, so callers only ever
//! see complete payloads.

pub mod codec;
pub mod error;

pub use codec::{
    decode_frame, encode_frame, FrameCodec, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MAGIC,
};
pub use error::{FrameError, Result};
