//! Transport client for the chat backend.
//!
//! This crate owns request building, response parsing, and the streaming
//! read loop over the backend's newline-delimited `data: ` event protocol.
//! It contains no conversation state: callers receive [`StreamEvent`]s in
//! arrival order and decide what to do with them.

pub mod client;
pub mod config;
pub mod error;
pub mod wire;

pub use client::{ChatApiClient, CancellationSignal, HEADER_REQUEST_ID};
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use stream_codec::StreamEvent;
pub use wire::{
    ChatRequest, LoginRequest, LoginResponse, MessageRecord, RegisterRequest, SessionRecord,
};
