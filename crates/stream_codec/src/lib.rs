//! Incremental decoding of a chat event stream.
//!
//! This crate owns the two leaf layers of the streaming pipeline: a frame
//! decoder that turns arbitrarily-split byte chunks into complete protocol
//! lines, and an event parser that maps each line to a typed [`StreamEvent`].
//! Neither layer ever errors on malformed input; unparseable bytes are
//! retained until a newline arrives and unparseable lines are dropped.

mod decoder;
mod event;

pub use decoder::FrameDecoder;
pub use event::{parse_line, StreamEvent, DATA_PREFIX};
