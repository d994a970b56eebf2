use serde::{Deserialize, Serialize};

/// Author of one conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One immutable turn in a session.
///
/// Messages never change once appended; the in-flight assistant turn lives
/// in [`StreamingBuffer`] until finalization and is not a `Message` before
/// that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    pub created_at: String,
}

/// Transient accumulation of the current assistant turn.
///
/// At most one exists process-wide. It is bound to the session that started
/// it; the store discards it if the current session moves away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingBuffer {
    pub session_id: String,
    pub thinking: String,
    pub content: String,
    /// Epoch token handed to the orchestrator; mutations carrying a stale
    /// generation are ignored, which is what makes late events after a
    /// cancellation harmless.
    pub generation: u64,
}

impl StreamingBuffer {
    #[must_use]
    pub fn new(session_id: impl Into<String>, generation: u64) -> Self {
        Self {
            session_id: session_id.into(),
            thinking: String::new(),
            content: String::new(),
            generation,
        }
    }
}
