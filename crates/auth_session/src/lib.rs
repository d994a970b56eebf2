//! Transparent token lifecycle management for authenticated requests.
//!
//! [`AuthGuard`] owns the current access/refresh token pair, attaches bearer
//! credentials to outgoing requests, and recovers from authorization expiry
//! with a single-flight renewal followed by exactly one replay of the
//! original request. Irrecoverable failures clear all stored credentials so
//! the caller can force navigation to the login entry point.
//!
//! Login and registration calls must not go through this guard: a 401 there
//! is a credential error, not a session-expiry error.

mod error;
mod guard;
mod tokens;

pub use error::AuthError;
pub use guard::{AuthGuard, RefreshRequest, RefreshResponse};
pub use tokens::{MemoryTokenStore, TokenPair, TokenStore, TokenStoreError};
