//! Single source of truth for sessions, messages, and the live streaming
//! buffer.
//!
//! All mutation goes through named, atomic operations on
//! [`ConversationStore`]; no partial or interleaved mutations are possible
//! from outside. Every mutation synchronously emits a [`StoreUpdate`] so a
//! UI layer can re-render without batching delay.

mod model;
mod store;

pub use model::{Message, Role, Session, StreamingBuffer};
pub use store::{ConversationStore, StoreError, StoreUpdate};
