use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use auth_session::{AuthGuard, TokenPair, TokenStore};
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response};
use stream_codec::{parse_line, FrameDecoder, StreamEvent};
use uuid::Uuid;

use crate::config::ChatApiConfig;
use crate::error::{parse_error_message, ChatApiError};
use crate::wire::{
    ChatRequest, LoginRequest, LoginResponse, MessageRecord, RegisterRequest,
    SessionCreateRequest, SessionRecord, SessionUpdateRequest,
};

/// Idempotency/tracing identifier attached once per logical user action.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Shared cancellation flag polled across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Typed client for the chat backend.
///
/// Authenticated calls flow through the [`AuthGuard`]; login and
/// registration deliberately do not, so a 401 there propagates to the
/// caller untouched.
pub struct ChatApiClient {
    http: Client,
    config: ChatApiConfig,
    guard: Arc<AuthGuard>,
}

impl ChatApiClient {
    pub fn new(
        config: ChatApiConfig,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, ChatApiError> {
        let http = Client::builder().build()?;
        let guard = Arc::new(AuthGuard::new(http.clone(), config.refresh_url(), store)?);
        Ok(Self {
            http,
            config,
            guard,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    #[must_use]
    pub fn guard(&self) -> &Arc<AuthGuard> {
        &self.guard
    }

    /// Exempt from 401 interception: a rejection here is a credential
    /// error. A successful login installs the returned pair in the guard.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginResponse, ChatApiError> {
        let response = self
            .plain(self.http.post(self.config.login_url()))
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let response = ok_or_status(response).await?;
        let payload: LoginResponse = response.json().await?;

        self.guard.install(TokenPair::new(
            payload.access_token.clone(),
            payload.refresh_token.clone().unwrap_or_default(),
        ))?;
        tracing::debug!(username, "logged in");
        Ok(payload)
    }

    /// Exempt from 401 interception, like [`ChatApiClient::login`].
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ChatApiError> {
        let response = self
            .plain(self.http.post(self.config.register_url()))
            .json(&RegisterRequest {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        ok_or_status(response).await?;
        Ok(())
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionRecord>, ChatApiError> {
        let response = self
            .guard
            .fetch_authenticated(self.plain(self.http.get(self.config.sessions_url())))
            .await?;
        Ok(ok_or_status(response).await?.json().await?)
    }

    pub async fn create_session(&self, title: &str) -> Result<SessionRecord, ChatApiError> {
        let builder = self
            .plain(self.http.post(self.config.sessions_url()))
            .json(&SessionCreateRequest {
                title: title.to_string(),
            });
        let response = self.guard.fetch_authenticated(builder).await?;
        Ok(ok_or_status(response).await?.json().await?)
    }

    pub async fn rename_session(
        &self,
        session_id: &str,
        title: &str,
    ) -> Result<(), ChatApiError> {
        let builder = self
            .plain(self.http.put(self.config.session_url(session_id)))
            .json(&SessionUpdateRequest {
                title: title.to_string(),
            });
        let response = self.guard.fetch_authenticated(builder).await?;
        ok_or_status(response).await?;
        Ok(())
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), ChatApiError> {
        let builder = self.plain(self.http.delete(self.config.session_url(session_id)));
        let response = self.guard.fetch_authenticated(builder).await?;
        ok_or_status(response).await?;
        Ok(())
    }

    /// Fetch a page of messages, oldest-first.
    ///
    /// `before_id` keys pagination by the caller's current oldest message;
    /// the returned page contains strictly older messages.
    pub async fn fetch_messages(
        &self,
        session_id: &str,
        before_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, ChatApiError> {
        let mut builder = self
            .plain(self.http.get(self.config.messages_url(session_id)))
            .query(&[("limit", limit.to_string())]);
        if let Some(before_id) = before_id {
            builder = builder.query(&[("before", before_id)]);
        }
        let response = self.guard.fetch_authenticated(builder).await?;
        Ok(ok_or_status(response).await?.json().await?)
    }

    /// Open a completion stream and deliver events in arrival order.
    ///
    /// `on_event` only ever sees non-terminal events: `done` completes the
    /// call, an `error` event surfaces as [`ChatApiError::Stream`], and
    /// nothing after either is delivered.
    pub async fn stream_completion<F>(
        &self,
        request: &ChatRequest,
        cancel: Option<&CancellationSignal>,
        on_event: F,
    ) -> Result<(), ChatApiError>
    where
        F: FnMut(StreamEvent),
    {
        let builder = self
            .stream_builder(self.http.post(self.config.completions_url()))
            .json(request);
        tracing::debug!(session_id = %request.session_id, "opening completion stream");
        self.stream_lines(builder, cancel, on_event).await
    }

    /// Open a regeneration stream for the session's latest exchange.
    pub async fn stream_regenerate<F>(
        &self,
        session_id: &str,
        cancel: Option<&CancellationSignal>,
        on_event: F,
    ) -> Result<(), ChatApiError>
    where
        F: FnMut(StreamEvent),
    {
        let builder = self.stream_builder(self.http.post(self.config.regenerate_url(session_id)));
        tracing::debug!(session_id, "opening regenerate stream");
        self.stream_lines(builder, cancel, on_event).await
    }

    async fn stream_lines<F>(
        &self,
        builder: RequestBuilder,
        cancel: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<(), ChatApiError>
    where
        F: FnMut(StreamEvent),
    {
        let response =
            await_or_cancel(self.guard.fetch_authenticated(builder), cancel).await??;
        let response = ok_or_status(response).await?;

        let mut bytes = response.bytes_stream();
        let mut decoder = FrameDecoder::default();

        loop {
            let next = tokio::time::timeout(self.config.idle_timeout, bytes.next());
            let chunk = match await_or_cancel(next, cancel).await? {
                Err(_) => return Err(ChatApiError::IdleTimeout(self.config.idle_timeout)),
                Ok(None) => break,
                Ok(Some(chunk)) => chunk.map_err(ChatApiError::from)?,
            };
            if is_cancelled(cancel) {
                return Err(ChatApiError::Cancelled);
            }
            for line in decoder.feed(&chunk) {
                if let Some(event) = parse_line(&line) {
                    if deliver(event, &mut on_event)? {
                        return Ok(());
                    }
                }
            }
        }

        if is_cancelled(cancel) {
            return Err(ChatApiError::Cancelled);
        }

        // Connection closed: an unterminated trailing line may still hold
        // the terminal event.
        if let Some(line) = decoder.finish() {
            if let Some(event) = parse_line(&line) {
                if deliver(event, &mut on_event)? {
                    return Ok(());
                }
            }
        }

        Err(ChatApiError::MissingTerminal)
    }

    /// Common headers for non-streaming requests.
    fn plain(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder.timeout(self.config.request_timeout);
        for (key, value) in &self.config.extra_headers {
            builder = builder.header(key, value);
        }
        builder
    }

    /// Common headers for streaming requests: no overall timeout (the idle
    /// watchdog bounds stalls instead) and one request id per user action.
    /// The auth replay reuses the cloned request, so the id is stable
    /// across the retry.
    fn stream_builder(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder
            .header(ACCEPT, "text/event-stream")
            .header(HEADER_REQUEST_ID, Uuid::new_v4().to_string());
        for (key, value) in &self.config.extra_headers {
            builder = builder.header(key, value);
        }
        builder
    }
}

/// Deliver one event; returns true when the stream is complete.
fn deliver<F>(event: StreamEvent, on_event: &mut F) -> Result<bool, ChatApiError>
where
    F: FnMut(StreamEvent),
{
    match event {
        StreamEvent::Done => Ok(true),
        StreamEvent::Error { data } => Err(ChatApiError::Stream(data)),
        other => {
            on_event(other);
            Ok(false)
        }
    }
}

async fn ok_or_status(response: Response) -> Result<Response, ChatApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = parse_error_message(status, &body);
    tracing::warn!(%status, message, "request rejected");
    Err(ChatApiError::Status { status, message })
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|signal| signal.load(Ordering::Acquire))
}

/// Await `future` while polling the cancellation signal.
async fn await_or_cancel<F>(
    future: F,
    cancel: Option<&CancellationSignal>,
) -> Result<F::Output, ChatApiError>
where
    F: Future,
{
    if cancel.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);
    loop {
        if is_cancelled(cancel) {
            return Err(ChatApiError::Cancelled);
        }
        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancel) {
                return Err(ChatApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
