//! Streaming chat client core.
//!
//! Ties the workspace crates together: `chat_api` talks to the backend,
//! `conversation_store` holds sessions and messages, `client_prefs` keeps
//! durable UI state, and [`ChatClient`] orchestrates one user action at a
//! time across them. The UI layer above renders the store and calls into
//! the client; nothing here draws anything.

mod client;
mod convert;
mod error;
mod ids;
mod transport;

pub use chat_api::{CancellationSignal, ChatApiClient, ChatApiConfig, StreamEvent};
pub use client::{ChatClient, RequestPhase, ScrollTarget, FIRST_TITLE_MAX_CHARS, PAGE_SIZE};
pub use client_prefs::{PrefsStore, TabScope};
pub use conversation_store::{ConversationStore, Message, Role, Session, StoreUpdate};
pub use convert::{message_from_record, session_from_record};
pub use error::ClientError;
pub use transport::ChatTransport;
