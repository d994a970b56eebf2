use std::collections::HashSet;

use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::model::{Message, Role, Session, StreamingBuffer};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A second stream may not start while one buffer is active; two
    /// concurrent streams would interleave their chunks into one buffer.
    #[error("a stream is already active for session '{0}'")]
    StreamBusy(String),
}

/// Change notification emitted synchronously by every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUpdate {
    Sessions,
    CurrentSession,
    Messages,
    /// Older messages were prepended; the UI re-anchors scroll by the count
    /// so visible messages keep their offset.
    MessagesPrepended { count: usize },
    Streaming,
    StreamingEnded,
}

/// Conversation state container.
///
/// Holds the session list, the current session's messages (oldest first),
/// and the at-most-one streaming buffer. The buffer is shown as a virtual
/// message after the real list and is only written into it atomically at
/// finalization.
#[derive(Debug, Default)]
pub struct ConversationStore {
    sessions: Vec<Session>,
    current_session_id: Option<String>,
    messages: Vec<Message>,
    buffer: Option<StreamingBuffer>,
    next_generation: u64,
    updates: Option<UnboundedSender<StoreUpdate>>,
}

impl ConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the synchronous update channel. Sends never block or batch;
    /// streaming appends reach the subscriber in mutation order.
    pub fn subscribe(&mut self) -> UnboundedReceiver<StoreUpdate> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.updates = Some(sender);
        receiver
    }

    #[must_use]
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    #[must_use]
    pub fn current_session_id(&self) -> Option<&str> {
        self.current_session_id.as_deref()
    }

    #[must_use]
    pub fn current_session(&self) -> Option<&Session> {
        let current = self.current_session_id.as_deref()?;
        self.sessions.iter().find(|session| session.id == current)
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn streaming(&self) -> Option<&StreamingBuffer> {
        self.buffer.as_ref()
    }

    #[must_use]
    pub fn streaming_active(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn set_sessions(&mut self, sessions: Vec<Session>) {
        self.sessions = sessions;
        self.emit(StoreUpdate::Sessions);
    }

    /// Insert a new session at the top of the list.
    pub fn add_session(&mut self, session: Session) {
        self.sessions.insert(0, session);
        self.emit(StoreUpdate::Sessions);
    }

    pub fn rename_session(&mut self, session_id: &str, title: impl Into<String>) {
        if let Some(session) = self
            .sessions
            .iter_mut()
            .find(|session| session.id == session_id)
        {
            session.title = title.into();
            self.emit(StoreUpdate::Sessions);
        }
    }

    /// Remove a session. Removing the current one selects a deterministic
    /// replacement: the first remaining session, or none. Returns the new
    /// current id.
    pub fn remove_session(&mut self, session_id: &str) -> Option<String> {
        self.sessions.retain(|session| session.id != session_id);
        self.emit(StoreUpdate::Sessions);

        if self
            .buffer
            .as_ref()
            .is_some_and(|buffer| buffer.session_id == session_id)
        {
            self.buffer = None;
            self.emit(StoreUpdate::StreamingEnded);
        }

        if self.current_session_id.as_deref() == Some(session_id) {
            let replacement = self.sessions.first().map(|session| session.id.clone());
            self.current_session_id = replacement;
            self.messages.clear();
            self.emit(StoreUpdate::CurrentSession);
            self.emit(StoreUpdate::Messages);
        }

        self.current_session_id.clone()
    }

    /// Make `session_id` current, clearing the loaded message list.
    ///
    /// A streaming buffer bound to a different session is discarded here:
    /// switches are never blocked, and an orphaned buffer must not leak
    /// into the newly-shown conversation.
    pub fn set_current_session(&mut self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        if self
            .buffer
            .as_ref()
            .is_some_and(|buffer| buffer.session_id != session_id)
        {
            self.buffer = None;
            self.emit(StoreUpdate::StreamingEnded);
        }
        if self.current_session_id.as_deref() != Some(session_id.as_str()) {
            self.messages.clear();
            self.emit(StoreUpdate::Messages);
        }
        self.current_session_id = Some(session_id);
        self.emit(StoreUpdate::CurrentSession);
    }

    /// Full replace, used on session load. Messages arrive oldest first.
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.emit(StoreUpdate::Messages);
    }

    /// Prepend a page of strictly older messages.
    ///
    /// Ids already present (and duplicates within the page) are dropped, so
    /// overlapping pages can never double-render a message. Returns how
    /// many messages were actually prepended.
    pub fn prepend_messages(&mut self, page: Vec<Message>) -> usize {
        let mut known: HashSet<String> = self
            .messages
            .iter()
            .map(|message| message.id.clone())
            .collect();
        let fresh: Vec<Message> = page
            .into_iter()
            .filter(|message| known.insert(message.id.clone()))
            .collect();

        let count = fresh.len();
        if count > 0 {
            self.messages.splice(0..0, fresh);
            self.emit(StoreUpdate::MessagesPrepended { count });
        }
        count
    }

    /// Append one immutable message at the end.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.emit(StoreUpdate::Messages);
    }

    /// Drop the most recent assistant message, if the list ends with one.
    /// Used by regeneration so a new answer replaces rather than
    /// duplicates.
    pub fn remove_last_assistant_message(&mut self) -> Option<Message> {
        if self.messages.last()?.role != Role::Assistant {
            return None;
        }
        let removed = self.messages.pop();
        self.emit(StoreUpdate::Messages);
        removed
    }

    /// Start the streaming buffer for `session_id`, returning its
    /// generation token. Rejected while another buffer is active.
    pub fn begin_streaming(&mut self, session_id: &str) -> Result<u64, StoreError> {
        if let Some(buffer) = &self.buffer {
            return Err(StoreError::StreamBusy(buffer.session_id.clone()));
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        self.buffer = Some(StreamingBuffer::new(session_id, generation));
        self.emit(StoreUpdate::Streaming);
        Ok(generation)
    }

    /// Grow the thinking channel. Stale generations are ignored.
    pub fn append_streaming_thinking(&mut self, generation: u64, delta: &str) -> bool {
        self.append_streaming(generation, delta, |buffer| &mut buffer.thinking)
    }

    /// Grow the content channel. Stale generations are ignored.
    pub fn append_streaming_content(&mut self, generation: u64, delta: &str) -> bool {
        self.append_streaming(generation, delta, |buffer| &mut buffer.content)
    }

    fn append_streaming(
        &mut self,
        generation: u64,
        delta: &str,
        channel: impl FnOnce(&mut StreamingBuffer) -> &mut String,
    ) -> bool {
        let Some(buffer) = self.buffer.as_mut().filter(|buffer| buffer.generation == generation)
        else {
            return false;
        };
        channel(buffer).push_str(delta);
        self.emit(StoreUpdate::Streaming);
        true
    }

    /// Reset the buffer's channels while keeping the stream active. Used
    /// between phases of a multi-phase operation; distinct from
    /// [`ConversationStore::end_streaming`], which also drops the active
    /// flag.
    pub fn clear_streaming(&mut self, generation: u64) -> bool {
        let Some(buffer) = self.buffer.as_mut().filter(|buffer| buffer.generation == generation)
        else {
            return false;
        };
        buffer.thinking.clear();
        buffer.content.clear();
        self.emit(StoreUpdate::Streaming);
        true
    }

    /// Reset the buffer and end the stream without producing a message
    /// (abort, failure).
    pub fn end_streaming(&mut self, generation: u64) -> bool {
        if !self
            .buffer
            .as_ref()
            .is_some_and(|buffer| buffer.generation == generation)
        {
            return false;
        }
        self.buffer = None;
        self.emit(StoreUpdate::StreamingEnded);
        true
    }

    /// Atomically convert the buffer into an immutable assistant message
    /// appended to the current list, ending the stream.
    ///
    /// Returns `None` for a stale generation or when the buffer was already
    /// discarded (e.g. by a session switch), in which case no message is
    /// produced.
    pub fn finalize_streaming(
        &mut self,
        generation: u64,
        message_id: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Option<Message> {
        if !self
            .buffer
            .as_ref()
            .is_some_and(|buffer| buffer.generation == generation)
        {
            return None;
        }
        let buffer = self.buffer.take()?;

        let message = Message {
            id: message_id.into(),
            role: Role::Assistant,
            content: buffer.content,
            thinking: Some(buffer.thinking).filter(|thinking| !thinking.is_empty()),
            created_at: created_at.into(),
        };

        // The buffer stays bound to its session; a finalize landing after
        // the user switched away must not write into the wrong list.
        if self.current_session_id.as_deref() == Some(buffer.session_id.as_str()) {
            self.messages.push(message.clone());
            self.emit(StoreUpdate::Messages);
        }
        self.emit(StoreUpdate::StreamingEnded);
        Some(message)
    }

    fn emit(&self, update: StoreUpdate) {
        if let Some(sender) = &self.updates {
            let _ = sender.send(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationStore, StoreError, StoreUpdate};
    use crate::model::{Message, Role, Session};

    fn session(id: &str) -> Session {
        Session {
            id: id.to_string(),
            title: format!("session {id}"),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn message(id: &str, role: Role) -> Message {
        Message {
            id: id.to_string(),
            role,
            content: format!("message {id}"),
            thinking: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn removing_current_session_selects_first_remaining() {
        let mut store = ConversationStore::new();
        store.set_sessions(vec![session("a"), session("b"), session("c")]);
        store.set_current_session("b");

        assert_eq!(store.remove_session("b").as_deref(), Some("a"));
        assert_eq!(store.current_session_id(), Some("a"));

        store.remove_session("a");
        assert_eq!(store.remove_session("c"), None);
        assert_eq!(store.current_session_id(), None);
    }

    #[test]
    fn removing_other_session_keeps_current() {
        let mut store = ConversationStore::new();
        store.set_sessions(vec![session("a"), session("b")]);
        store.set_current_session("a");
        store.set_messages(vec![message("1", Role::User)]);

        assert_eq!(store.remove_session("b").as_deref(), Some("a"));
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn prepend_filters_already_known_ids() {
        let mut store = ConversationStore::new();
        store.set_messages(vec![message("10", Role::User), message("11", Role::Assistant)]);

        let count = store.prepend_messages(vec![
            message("8", Role::User),
            message("9", Role::Assistant),
            message("10", Role::User), // overlap with visible list
            message("8", Role::User),  // duplicate within the page
        ]);

        assert_eq!(count, 2);
        let ids: Vec<&str> = store.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["8", "9", "10", "11"]);
    }

    #[test]
    fn second_stream_is_rejected_while_active() {
        let mut store = ConversationStore::new();
        store.set_sessions(vec![session("a")]);
        store.set_current_session("a");

        let generation = store.begin_streaming("a").expect("first stream starts");
        let error = store
            .begin_streaming("a")
            .expect_err("second stream must be rejected");
        assert!(matches!(error, StoreError::StreamBusy(id) if id == "a"));

        assert!(store.end_streaming(generation));
        store.begin_streaming("a").expect("free again after end");
    }

    #[test]
    fn stale_generation_mutations_are_ignored() {
        let mut store = ConversationStore::new();
        store.set_sessions(vec![session("a")]);
        store.set_current_session("a");

        let stale = store.begin_streaming("a").expect("stream starts");
        assert!(store.append_streaming_content(stale, "partial"));
        assert!(store.end_streaming(stale));

        // Late-arriving events from the aborted request.
        assert!(!store.append_streaming_content(stale, "ghost"));
        assert!(!store.append_streaming_thinking(stale, "ghost"));
        assert!(store.finalize_streaming(stale, "m", "t").is_none());
        assert!(!store.end_streaming(stale));
        assert!(!store.streaming_active());
    }

    #[test]
    fn clear_keeps_stream_active_end_does_not() {
        let mut store = ConversationStore::new();
        store.set_sessions(vec![session("a")]);
        store.set_current_session("a");

        let generation = store.begin_streaming("a").expect("stream starts");
        store.append_streaming_thinking(generation, "phase one");
        assert!(store.clear_streaming(generation));
        assert!(store.streaming_active(), "clear must not end the stream");
        let buffer = store.streaming().expect("buffer still present");
        assert!(buffer.thinking.is_empty() && buffer.content.is_empty());

        assert!(store.end_streaming(generation));
        assert!(!store.streaming_active());
    }

    #[test]
    fn finalize_appends_exactly_one_assistant_message() {
        let mut store = ConversationStore::new();
        store.set_sessions(vec![session("a")]);
        store.set_current_session("a");

        let generation = store.begin_streaming("a").expect("stream starts");
        store.append_streaming_thinking(generation, "step1");
        store.append_streaming_content(generation, "ans");
        store.append_streaming_content(generation, "wer");

        let message = store
            .finalize_streaming(generation, "m-1", "2026-01-01T00:00:02Z")
            .expect("finalize produces the message");
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "answer");
        assert_eq!(message.thinking.as_deref(), Some("step1"));

        assert_eq!(store.messages().len(), 1);
        assert!(!store.streaming_active());

        // Terminal transitions are single-shot.
        assert!(store.finalize_streaming(generation, "m-2", "t").is_none());
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn empty_thinking_finalizes_as_none() {
        let mut store = ConversationStore::new();
        store.set_sessions(vec![session("a")]);
        store.set_current_session("a");

        let generation = store.begin_streaming("a").expect("stream starts");
        store.append_streaming_content(generation, "answer");
        let message = store
            .finalize_streaming(generation, "m-1", "t")
            .expect("finalize produces the message");
        assert_eq!(message.thinking, None);
    }

    #[test]
    fn switching_sessions_discards_a_buffer_bound_elsewhere() {
        let mut store = ConversationStore::new();
        store.set_sessions(vec![session("a"), session("b")]);
        store.set_current_session("a");

        let generation = store.begin_streaming("a").expect("stream starts");
        store.append_streaming_content(generation, "orphaned");
        store.set_current_session("b");

        assert!(!store.streaming_active());
        // The old stream can no longer write anywhere.
        assert!(!store.append_streaming_content(generation, "late"));
        assert!(store.finalize_streaming(generation, "m", "t").is_none());
        assert!(store.messages().is_empty());
    }

    #[test]
    fn finalize_after_switch_back_is_still_dead() {
        let mut store = ConversationStore::new();
        store.set_sessions(vec![session("a"), session("b")]);
        store.set_current_session("a");
        let generation = store.begin_streaming("a").expect("stream starts");
        store.set_current_session("b");
        store.set_current_session("a");
        assert!(store.finalize_streaming(generation, "m", "t").is_none());
    }

    #[test]
    fn regeneration_removes_only_a_trailing_assistant_message() {
        let mut store = ConversationStore::new();
        store.set_messages(vec![message("1", Role::User), message("2", Role::Assistant)]);
        assert_eq!(
            store
                .remove_last_assistant_message()
                .map(|message| message.id),
            Some("2".to_string())
        );
        // List now ends with a user message: nothing to remove.
        assert!(store.remove_last_assistant_message().is_none());
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn updates_are_emitted_synchronously_in_mutation_order() {
        let mut store = ConversationStore::new();
        let mut updates = store.subscribe();

        store.set_sessions(vec![session("a")]);
        store.set_current_session("a");
        let generation = store.begin_streaming("a").expect("stream starts");
        store.append_streaming_content(generation, "x");
        store.finalize_streaming(generation, "m", "t");

        let mut seen = Vec::new();
        while let Ok(update) = updates.try_recv() {
            seen.push(update);
        }
        assert_eq!(
            seen,
            vec![
                StoreUpdate::Sessions,
                StoreUpdate::Messages,
                StoreUpdate::CurrentSession,
                StoreUpdate::Streaming,
                StoreUpdate::Streaming,
                StoreUpdate::Messages,
                StoreUpdate::StreamingEnded,
            ]
        );
    }
}
