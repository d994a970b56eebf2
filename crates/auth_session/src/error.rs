use thiserror::Error;

use crate::tokens::TokenStoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// No credentials are available; the caller must log in first.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The session is irrecoverably expired: renewal failed, the refresh
    /// endpoint itself returned 401, or a replayed request was rejected
    /// again. Stored credentials have been cleared; the caller must force
    /// navigation to the login entry point.
    #[error("session expired; login required")]
    SessionExpired,

    /// The request body cannot be cloned for a replay.
    #[error("request cannot be replayed after token renewal")]
    Unreplayable,

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] TokenStoreError),
}

impl AuthError {
    /// True when the caller must discard the session and return to login.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}
