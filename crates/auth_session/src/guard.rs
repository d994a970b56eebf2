use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::AuthError;
use crate::tokens::{TokenPair, TokenStore};

/// Body POSTed to the token-refresh endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token-refresh endpoint response.
///
/// Absence of `access_token` is a renewal failure. A new refresh token is
/// optional; the stored one is only overwritten when the server supplies a
/// replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Owns the token pair and the single-flight renewal path.
///
/// All token writes go through this guard. Renewal is single-flight: the
/// epoch counter records completed renewals, and a caller that waited on the
/// renewal mutex while another caller renewed reuses that outcome instead of
/// spending the refresh token a second time.
pub struct AuthGuard {
    http: Client,
    refresh_url: String,
    store: Arc<dyn TokenStore>,
    tokens: Mutex<Option<TokenPair>>,
    epoch: AtomicU64,
    renewal: AsyncMutex<()>,
}

impl AuthGuard {
    /// Creates a guard backed by `store`, seeding the in-memory pair from
    /// whatever the store already holds.
    pub fn new(
        http: Client,
        refresh_url: impl Into<String>,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, AuthError> {
        let seeded = store.load()?;
        Ok(Self {
            http,
            refresh_url: refresh_url.into(),
            store,
            tokens: Mutex::new(seeded),
            epoch: AtomicU64::new(0),
            renewal: AsyncMutex::new(()),
        })
    }

    /// Installs a freshly-issued pair (login, registration).
    pub fn install(&self, tokens: TokenPair) -> Result<(), AuthError> {
        *self.lock_tokens() = Some(tokens.clone());
        self.store.save(&tokens)?;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Clears all credentials, durable and in-memory.
    pub fn logout(&self) -> Result<(), AuthError> {
        *self.lock_tokens() = None;
        self.store.clear()?;
        Ok(())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock_tokens().is_some()
    }

    #[must_use]
    pub fn tokens(&self) -> Option<TokenPair> {
        self.lock_tokens().clone()
    }

    /// Sends `request` with the current bearer credential attached.
    ///
    /// On a 401 the guard renews the pair (single-flight) and replays the
    /// original request exactly once with the new access token. A 401 from
    /// the refresh endpoint itself, a failed renewal, or a second 401 after
    /// replay clears all credentials and surfaces
    /// [`AuthError::SessionExpired`].
    pub async fn fetch_authenticated(
        &self,
        request: RequestBuilder,
    ) -> Result<Response, AuthError> {
        let replay = request.try_clone();
        let (access, observed_epoch) = self.current_access()?;

        let response = request.bearer_auth(&access).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if self.is_refresh_endpoint(response.url().as_str()) {
            tracing::warn!("refresh endpoint rejected its own credentials; forcing logout");
            self.discard_credentials();
            return Err(AuthError::SessionExpired);
        }

        let replay = replay.ok_or(AuthError::Unreplayable)?;
        let renewed = self.renew(observed_epoch).await?;

        let response = replay.bearer_auth(&renewed).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("request rejected again after token renewal; forcing logout");
            self.discard_credentials();
            return Err(AuthError::SessionExpired);
        }

        Ok(response)
    }

    /// Renews the pair, or reuses a renewal that completed while waiting.
    async fn renew(&self, observed_epoch: u64) -> Result<String, AuthError> {
        let _flight = self.renewal.lock().await;

        if self.epoch.load(Ordering::Acquire) != observed_epoch {
            // Another caller renewed while we waited on the mutex.
            let (access, _) = self
                .current_access()
                .map_err(|_| AuthError::SessionExpired)?;
            return Ok(access);
        }

        let refresh_token = match self.lock_tokens().as_ref() {
            Some(pair) if !pair.refresh_token.is_empty() => pair.refresh_token.clone(),
            _ => {
                self.discard_credentials();
                return Err(AuthError::SessionExpired);
            }
        };

        tracing::debug!(url = %self.refresh_url, "renewing access token");
        let response = self
            .http
            .post(&self.refresh_url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "token renewal rejected; forcing logout");
            self.discard_credentials();
            return Err(AuthError::SessionExpired);
        }

        let payload: RefreshResponse = match response.json().await {
            Ok(payload) => payload,
            Err(_) => {
                self.discard_credentials();
                return Err(AuthError::SessionExpired);
            }
        };
        let access = match payload.access_token.filter(|token| !token.is_empty()) {
            Some(access) => access,
            None => {
                self.discard_credentials();
                return Err(AuthError::SessionExpired);
            }
        };

        let updated = {
            let mut tokens = self.lock_tokens();
            let previous_refresh = tokens
                .as_ref()
                .map(|pair| pair.refresh_token.clone())
                .unwrap_or_default();
            let updated = TokenPair {
                access_token: access.clone(),
                refresh_token: payload
                    .refresh_token
                    .filter(|token| !token.is_empty())
                    .unwrap_or(previous_refresh),
            };
            *tokens = Some(updated.clone());
            updated
        };

        self.store.save(&updated)?;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("access token renewed");
        Ok(access)
    }

    fn current_access(&self) -> Result<(String, u64), AuthError> {
        // Epoch is read before the token so a renewal landing in between is
        // observed as already-completed by the single-flight check.
        let epoch = self.epoch.load(Ordering::Acquire);
        let access = self
            .lock_tokens()
            .as_ref()
            .map(|pair| pair.access_token.clone())
            .ok_or(AuthError::NotAuthenticated)?;
        Ok((access, epoch))
    }

    fn is_refresh_endpoint(&self, url: &str) -> bool {
        url.trim_end_matches('/') == self.refresh_url.trim_end_matches('/')
    }

    fn discard_credentials(&self) {
        *self.lock_tokens() = None;
        if let Err(error) = self.store.clear() {
            tracing::warn!(%error, "failed to clear durable credentials");
        }
    }

    fn lock_tokens(&self) -> MutexGuard<'_, Option<TokenPair>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
