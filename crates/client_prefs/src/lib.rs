//! Durable client-side preferences: stored credentials, the last open
//! session and model, and per-session scroll offsets.
//!
//! Everything lives in one JSON file under the state directory and is
//! rewritten atomically on every change. [`PrefsStore`] doubles as the
//! credential store for `auth_session`, so login survives restarts.

mod error;
mod paths;
mod store;
mod tabs;

pub use error::PrefsError;
pub use paths::{prefs_file, prefs_root};
pub use store::PrefsStore;
pub use tabs::TabScope;
