use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access/refresh token pair for one authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Failure raised by a durable token store.
#[derive(Debug, Error)]
#[error("token store failure: {0}")]
pub struct TokenStoreError(pub String);

/// Durable scope for the token pair, outside any reactive state.
///
/// The guard is the only writer; no other component may store tokens
/// directly.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<TokenPair>, TokenStoreError>;
    fn save(&self, tokens: &TokenPair) -> Result<(), TokenStoreError>;
    fn clear(&self) -> Result<(), TokenStoreError>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new(tokens: Option<TokenPair>) -> Self {
        Self {
            tokens: Mutex::new(tokens),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenPair>, TokenStoreError> {
        Ok(self
            .tokens
            .lock()
            .map_err(|_| TokenStoreError("poisoned token cell".to_string()))?
            .clone())
    }

    fn save(&self, tokens: &TokenPair) -> Result<(), TokenStoreError> {
        *self
            .tokens
            .lock()
            .map_err(|_| TokenStoreError("poisoned token cell".to_string()))? =
            Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self
            .tokens
            .lock()
            .map_err(|_| TokenStoreError("poisoned token cell".to_string()))? = None;
        Ok(())
    }
}
