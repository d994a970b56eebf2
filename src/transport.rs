use chat_api::{
    CancellationSignal, ChatApiClient, ChatApiError, ChatRequest, MessageRecord, SessionRecord,
    StreamEvent,
};
use futures_util::future::BoxFuture;

/// Backend operations the orchestrator needs, object-safe so tests can
/// substitute a scripted transport for the HTTP client.
pub trait ChatTransport: Send + Sync {
    fn list_sessions(&self) -> BoxFuture<'_, Result<Vec<SessionRecord>, ChatApiError>>;

    fn create_session<'a>(
        &'a self,
        title: &'a str,
    ) -> BoxFuture<'a, Result<SessionRecord, ChatApiError>>;

    fn rename_session<'a>(
        &'a self,
        session_id: &'a str,
        title: &'a str,
    ) -> BoxFuture<'a, Result<(), ChatApiError>>;

    fn delete_session<'a>(&'a self, session_id: &'a str)
        -> BoxFuture<'a, Result<(), ChatApiError>>;

    fn fetch_messages<'a>(
        &'a self,
        session_id: &'a str,
        before_id: Option<&'a str>,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<MessageRecord>, ChatApiError>>;

    /// Stream a completion for `request`, forwarding accumulation events
    /// in arrival order. Resolves `Ok` only after the terminal `done`.
    fn stream_send<'a>(
        &'a self,
        request: ChatRequest,
        cancel: &'a CancellationSignal,
        on_event: &'a mut (dyn FnMut(StreamEvent) + Send),
    ) -> BoxFuture<'a, Result<(), ChatApiError>>;

    /// Stream a replacement answer for the session's latest exchange.
    fn stream_regenerate<'a>(
        &'a self,
        session_id: &'a str,
        cancel: &'a CancellationSignal,
        on_event: &'a mut (dyn FnMut(StreamEvent) + Send),
    ) -> BoxFuture<'a, Result<(), ChatApiError>>;
}

impl ChatTransport for ChatApiClient {
    fn list_sessions(&self) -> BoxFuture<'_, Result<Vec<SessionRecord>, ChatApiError>> {
        Box::pin(self.list_sessions())
    }

    fn create_session<'a>(
        &'a self,
        title: &'a str,
    ) -> BoxFuture<'a, Result<SessionRecord, ChatApiError>> {
        Box::pin(self.create_session(title))
    }

    fn rename_session<'a>(
        &'a self,
        session_id: &'a str,
        title: &'a str,
    ) -> BoxFuture<'a, Result<(), ChatApiError>> {
        Box::pin(self.rename_session(session_id, title))
    }

    fn delete_session<'a>(
        &'a self,
        session_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ChatApiError>> {
        Box::pin(self.delete_session(session_id))
    }

    fn fetch_messages<'a>(
        &'a self,
        session_id: &'a str,
        before_id: Option<&'a str>,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<MessageRecord>, ChatApiError>> {
        Box::pin(self.fetch_messages(session_id, before_id, limit))
    }

    fn stream_send<'a>(
        &'a self,
        request: ChatRequest,
        cancel: &'a CancellationSignal,
        on_event: &'a mut (dyn FnMut(StreamEvent) + Send),
    ) -> BoxFuture<'a, Result<(), ChatApiError>> {
        Box::pin(async move {
            self.stream_completion(&request, Some(cancel), |event| on_event(event))
                .await
        })
    }

    fn stream_regenerate<'a>(
        &'a self,
        session_id: &'a str,
        cancel: &'a CancellationSignal,
        on_event: &'a mut (dyn FnMut(StreamEvent) + Send),
    ) -> BoxFuture<'a, Result<(), ChatApiError>> {
        Box::pin(async move {
            self.stream_regenerate(session_id, Some(cancel), |event| on_event(event))
                .await
        })
    }
}
