//! Stream decoding — bytes → `data:` payloads → typed frames.
//!
//! DESIGN
//! ======
//! Decoding is split in two pure stages so the controller can feed it
//! arbitrary network chunking. [`decoder::SseDecoder`] buffers raw bytes and
//! yields complete `data:` payloads; [`frame::parse_payload`] turns one payload
//! into a [`frame::StreamEvent`]. Neither stage performs I/O.

pub mod decoder;
pub mod frame;

pub use decoder::SseDecoder;
pub use frame::{DONE_SENTINEL, StreamEvent, StreamFrame, parse_payload};
