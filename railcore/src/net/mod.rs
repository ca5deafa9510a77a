//! Length-prefixed framing over a blocking byte stream.

pub mod buffer;
pub mod chunk;
pub mod chunkpool;
pub mod framer;

pub use framer::{encode_response, FrameReader};
