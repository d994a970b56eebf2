use chat_api::ChatApiError;
use client_prefs::PrefsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// One stream at a time; the caller retries after the active one ends.
    #[error("a response is already streaming")]
    StreamBusy,

    #[error("no session is selected")]
    NoActiveSession,

    /// Credentials are gone for good; the caller returns to login.
    #[error("session expired, sign in again")]
    SessionExpired,

    #[error(transparent)]
    Api(ChatApiError),

    #[error(transparent)]
    Prefs(#[from] PrefsError),
}

impl From<ChatApiError> for ClientError {
    fn from(error: ChatApiError) -> Self {
        if error.is_session_expired() {
            Self::SessionExpired
        } else {
            Self::Api(error)
        }
    }
}
