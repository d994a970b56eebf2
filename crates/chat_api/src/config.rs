use std::collections::BTreeMap;
use std::time::Duration;

/// Default base URL for a locally-run backend.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Transport configuration for chat backend requests.
#[derive(Debug, Clone)]
pub struct ChatApiConfig {
    /// Base URL of the backend; API paths are appended under `/api`.
    pub base_url: String,
    /// Per-request timeout for non-streaming calls.
    pub request_timeout: Duration,
    /// Maximum allowed gap between received stream chunks. A silently
    /// stalled connection must not wedge the streaming flag forever.
    pub idle_timeout: Duration,
    /// Additional headers merged into every request.
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for ChatApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
            extra_headers: BTreeMap::new(),
        }
    }
}

impl ChatApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api{path}", self.base_url.trim_end_matches('/'))
    }

    #[must_use]
    pub fn login_url(&self) -> String {
        self.endpoint("/auth/login")
    }

    #[must_use]
    pub fn register_url(&self) -> String {
        self.endpoint("/auth/register")
    }

    #[must_use]
    pub fn refresh_url(&self) -> String {
        self.endpoint("/auth/refresh")
    }

    #[must_use]
    pub fn sessions_url(&self) -> String {
        self.endpoint("/chat/sessions")
    }

    #[must_use]
    pub fn session_url(&self, session_id: &str) -> String {
        self.endpoint(&format!("/chat/sessions/{session_id}"))
    }

    #[must_use]
    pub fn messages_url(&self, session_id: &str) -> String {
        self.endpoint(&format!("/chat/sessions/{session_id}/messages"))
    }

    #[must_use]
    pub fn completions_url(&self) -> String {
        self.endpoint("/chat/completions")
    }

    #[must_use]
    pub fn regenerate_url(&self, session_id: &str) -> String {
        self.endpoint(&format!("/chat/sessions/{session_id}/regenerate"))
    }
}
