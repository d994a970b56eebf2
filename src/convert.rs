use chat_api::{MessageRecord, SessionRecord};
use conversation_store::{Message, Role, Session};

#[must_use]
pub fn session_from_record(record: SessionRecord) -> Session {
    Session {
        id: record.id,
        title: record.title,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

/// Unknown roles (system, tool) render as user turns rather than being
/// dropped; the store only distinguishes user from assistant.
#[must_use]
pub fn message_from_record(record: MessageRecord) -> Message {
    let role = if record.role == "assistant" {
        Role::Assistant
    } else {
        Role::User
    };
    Message {
        id: record.id,
        role,
        content: record.content,
        thinking: record.thinking.filter(|thinking| !thinking.is_empty()),
        created_at: record.created_at,
    }
}
