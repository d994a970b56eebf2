use std::sync::Arc;

use chat_api::{CancellationSignal, ChatApiError, ChatRequest, StreamEvent};
use client_prefs::{PrefsStore, TabScope};
use conversation_store::{ConversationStore, Message, Role, StoreUpdate};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::convert::{message_from_record, session_from_record};
use crate::error::ClientError;
use crate::ids::{now_rfc3339, LocalIds};
use crate::transport::ChatTransport;

/// Messages fetched per page when loading or paginating a session.
pub const PAGE_SIZE: usize = 20;

/// Sessions are titled from their first message, truncated to this many
/// characters on a char boundary.
pub const FIRST_TITLE_MAX_CHARS: usize = 50;

/// Lifecycle of the most recent streaming request, for display and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    /// Request sent, no event received yet.
    Opened,
    /// At least one accumulation event arrived.
    Streaming,
    Finalized,
    Aborted,
    Failed,
}

/// Where the view should scroll after a session switch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollTarget {
    Bottom,
    Offset(f64),
}

/// Orchestrates one user action at a time against the backend.
///
/// Owns the conversation store and the durable preferences; the UI reads
/// state through [`ChatClient::store`] and reacts to [`StoreUpdate`]s. All
/// methods take `&mut self`, so actions are serialized by construction;
/// the only concurrent input is the cancellation signal, which any task
/// holding a clone may trip mid-stream.
pub struct ChatClient {
    transport: Arc<dyn ChatTransport>,
    store: ConversationStore,
    prefs: Arc<PrefsStore>,
    tabs: TabScope,
    ids: LocalIds,
    phase: RequestPhase,
}

impl ChatClient {
    #[must_use]
    pub fn new(transport: Arc<dyn ChatTransport>, prefs: Arc<PrefsStore>) -> Self {
        Self {
            transport,
            store: ConversationStore::new(),
            prefs,
            tabs: TabScope::new(),
            ids: LocalIds::default(),
            phase: RequestPhase::Idle,
        }
    }

    /// Mint a signal to pass into [`ChatClient::send_message`] or
    /// [`ChatClient::regenerate`]; keep a clone and set it to abort.
    #[must_use]
    pub fn new_cancel_signal() -> CancellationSignal {
        CancellationSignal::default()
    }

    #[must_use]
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    #[must_use]
    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<StoreUpdate> {
        self.store.subscribe()
    }

    /// Reload the session list. Call once at startup and after any
    /// out-of-band change.
    pub async fn refresh_sessions(&mut self) -> Result<(), ClientError> {
        let transport = Arc::clone(&self.transport);
        let records = transport.list_sessions().await?;
        self.store
            .set_sessions(records.into_iter().map(session_from_record).collect());
        Ok(())
    }

    /// Load sessions and reopen the last-used one, falling back to the
    /// newest. Returns `None` when the account has no sessions yet.
    pub async fn bootstrap(&mut self) -> Result<Option<ScrollTarget>, ClientError> {
        self.refresh_sessions().await?;
        let candidate = self
            .prefs
            .last_session_id()
            .filter(|id| self.store.sessions().iter().any(|session| &session.id == id))
            .or_else(|| self.store.sessions().first().map(|session| session.id.clone()));
        match candidate {
            Some(session_id) => Ok(Some(self.switch_session(&session_id, None).await?)),
            None => Ok(None),
        }
    }

    /// Create a session on the server and make it current. Returns its id.
    pub async fn new_session(&mut self, title: &str) -> Result<String, ClientError> {
        let transport = Arc::clone(&self.transport);
        let record = transport.create_session(title).await?;
        let session = session_from_record(record);
        let session_id = session.id.clone();
        self.store.add_session(session);
        self.store.set_current_session(&session_id);
        self.tabs.visit(&session_id);
        self.prefs.set_last_session_id(Some(session_id.clone()))?;
        Ok(session_id)
    }

    pub async fn rename_session(
        &mut self,
        session_id: &str,
        title: &str,
    ) -> Result<(), ClientError> {
        let transport = Arc::clone(&self.transport);
        transport.rename_session(session_id, title).await?;
        self.store.rename_session(session_id, title);
        Ok(())
    }

    /// Delete a session everywhere: server, store, durable preferences.
    /// Returns the id of the session that became current, if any.
    pub async fn delete_session(
        &mut self,
        session_id: &str,
    ) -> Result<Option<String>, ClientError> {
        let transport = Arc::clone(&self.transport);
        transport.delete_session(session_id).await?;
        let replacement = self.store.remove_session(session_id);
        self.tabs.forget(session_id);
        self.prefs.remove_session_state(session_id)?;
        if let Some(replacement) = &replacement {
            self.prefs.set_last_session_id(Some(replacement.clone()))?;
        }
        Ok(replacement)
    }

    /// Make `session_id` current and load its latest page of messages.
    ///
    /// `current_scroll` is the outgoing session's scroll offset, persisted
    /// so a revisit can restore it. The returned target is `Offset` only
    /// for a session already visited in this run; a first open always
    /// lands at the bottom, even with a persisted offset from a previous
    /// run.
    pub async fn switch_session(
        &mut self,
        session_id: &str,
        current_scroll: Option<f64>,
    ) -> Result<ScrollTarget, ClientError> {
        if let Some(previous) = self.store.current_session_id().map(str::to_string) {
            if previous != session_id {
                if let Some(offset) = current_scroll {
                    self.prefs.set_scroll_offset(&previous, offset)?;
                }
            }
        }

        self.store.set_current_session(session_id);
        let transport = Arc::clone(&self.transport);
        let records = transport.fetch_messages(session_id, None, PAGE_SIZE).await?;
        self.store
            .set_messages(records.into_iter().map(message_from_record).collect());
        self.prefs.set_last_session_id(Some(session_id.to_string()))?;

        let revisit = self.tabs.visit(session_id);
        if revisit {
            if let Some(offset) = self.prefs.scroll_offset(session_id) {
                return Ok(ScrollTarget::Offset(offset));
            }
        }
        Ok(ScrollTarget::Bottom)
    }

    /// Fetch the page of messages older than the oldest one loaded and
    /// prepend it. Returns how many messages were added; zero means the
    /// top of history.
    pub async fn load_older(&mut self) -> Result<usize, ClientError> {
        let session_id = self.current_session_id()?;
        let before_id = self.store.messages().first().map(|message| message.id.clone());
        let transport = Arc::clone(&self.transport);
        let records = transport
            .fetch_messages(&session_id, before_id.as_deref(), PAGE_SIZE)
            .await?;
        Ok(self
            .store
            .prepend_messages(records.into_iter().map(message_from_record).collect()))
    }

    /// Send `content` as the user and stream the assistant's answer into
    /// the store.
    ///
    /// Resolves when the stream ends, one way or another: a completed
    /// answer finalizes into a message, a tripped `cancel` discards the
    /// partial quietly, and a failure is surfaced as an assistant-side
    /// error message in the conversation. Only an expired login is
    /// returned as an error, because the caller must react to it.
    pub async fn send_message(
        &mut self,
        content: &str,
        cancel: &CancellationSignal,
    ) -> Result<(), ClientError> {
        let session_id = self.current_session_id()?;
        if self.store.streaming_active() {
            return Err(ClientError::StreamBusy);
        }

        self.store.add_message(Message {
            id: self.ids.next(),
            role: Role::User,
            content: content.to_string(),
            thinking: None,
            created_at: now_rfc3339(),
        });
        if self.store.messages().len() == 1 {
            self.retitle_from_first_message(&session_id, content).await;
        }

        let generation = self
            .store
            .begin_streaming(&session_id)
            .map_err(|_| ClientError::StreamBusy)?;
        let request = ChatRequest {
            session_id: session_id.clone(),
            content: content.to_string(),
            model: self.prefs.last_model_id(),
        };

        let result = {
            let transport = Arc::clone(&self.transport);
            let store = &mut self.store;
            let phase = &mut self.phase;
            transition(phase, RequestPhase::Opened);
            let mut on_event = accumulate(store, phase, generation);
            transport.stream_send(request, cancel, &mut on_event).await
        };
        self.settle_stream(&session_id, generation, result)
    }

    /// Replace the latest assistant answer with a fresh one.
    pub async fn regenerate(&mut self, cancel: &CancellationSignal) -> Result<(), ClientError> {
        let session_id = self.current_session_id()?;
        if self.store.streaming_active() {
            return Err(ClientError::StreamBusy);
        }

        self.store.remove_last_assistant_message();
        let generation = self
            .store
            .begin_streaming(&session_id)
            .map_err(|_| ClientError::StreamBusy)?;

        let result = {
            let transport = Arc::clone(&self.transport);
            let store = &mut self.store;
            let phase = &mut self.phase;
            transition(phase, RequestPhase::Opened);
            let mut on_event = accumulate(store, phase, generation);
            transport
                .stream_regenerate(&session_id, cancel, &mut on_event)
                .await
        };
        self.settle_stream(&session_id, generation, result)
    }

    fn settle_stream(
        &mut self,
        session_id: &str,
        generation: u64,
        result: Result<(), ChatApiError>,
    ) -> Result<(), ClientError> {
        match result {
            Ok(()) => {
                let message_id = self.ids.next();
                self.store
                    .finalize_streaming(generation, message_id, now_rfc3339());
                transition(&mut self.phase, RequestPhase::Finalized);
                Ok(())
            }
            Err(error) if error.is_cancelled() => {
                self.store.end_streaming(generation);
                transition(&mut self.phase, RequestPhase::Aborted);
                tracing::debug!(session_id, "stream cancelled");
                Ok(())
            }
            Err(error) if error.is_session_expired() => {
                self.store.end_streaming(generation);
                transition(&mut self.phase, RequestPhase::Failed);
                Err(ClientError::SessionExpired)
            }
            Err(error) => {
                self.store.end_streaming(generation);
                transition(&mut self.phase, RequestPhase::Failed);
                tracing::warn!(session_id, %error, "stream failed");
                // Failure shows up in the conversation itself, so the
                // exchange is not silently half-missing.
                if self.store.current_session_id() == Some(session_id) {
                    self.store.add_message(Message {
                        id: self.ids.next(),
                        role: Role::Assistant,
                        content: format!("Error: {error}"),
                        thinking: None,
                        created_at: now_rfc3339(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Best effort: the conversation works fine under the placeholder
    /// title, so a rename failure is logged and swallowed.
    async fn retitle_from_first_message(&mut self, session_id: &str, content: &str) {
        let title = truncate_chars(content.trim(), FIRST_TITLE_MAX_CHARS);
        if title.is_empty() {
            return;
        }
        let transport = Arc::clone(&self.transport);
        match transport.rename_session(session_id, &title).await {
            Ok(()) => self.store.rename_session(session_id, title),
            Err(error) => tracing::warn!(session_id, %error, "first-message retitle failed"),
        }
    }

    fn current_session_id(&self) -> Result<String, ClientError> {
        self.store
            .current_session_id()
            .map(str::to_string)
            .ok_or(ClientError::NoActiveSession)
    }
}

/// Closure that routes accumulation events into the store under one
/// generation, flipping the phase on the first event.
fn accumulate<'a>(
    store: &'a mut ConversationStore,
    phase: &'a mut RequestPhase,
    generation: u64,
) -> impl FnMut(StreamEvent) + Send + 'a {
    move |event| {
        if *phase != RequestPhase::Streaming {
            transition(phase, RequestPhase::Streaming);
        }
        match event {
            StreamEvent::Thinking { data } => {
                store.append_streaming_thinking(generation, &data);
            }
            StreamEvent::Content { data } => {
                store.append_streaming_content(generation, &data);
            }
            // Terminal events never reach this callback.
            StreamEvent::Done | StreamEvent::Error { .. } => {}
        }
    }
}

fn transition(phase: &mut RequestPhase, next: RequestPhase) {
    let from = *phase;
    tracing::debug!(?from, to = ?next, "request phase");
    *phase = next;
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((boundary, _)) => text[..boundary].to_string(),
        None => text.to_string(),
    }
}
