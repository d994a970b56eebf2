use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use auth_session::{TokenPair, TokenStore, TokenStoreError};
use serde::{Deserialize, Serialize};

use crate::error::PrefsError;

/// On-disk shape of the preferences file. Unknown fields from newer
/// versions are dropped on rewrite; every field is optional so an empty
/// object is a valid file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PrefsData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tokens: Option<TokenPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_model_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    scroll_offsets: BTreeMap<String, f64>,
}

/// JSON-file preference store, rewritten atomically on every mutation.
///
/// Writes go to a sibling temp file first and are renamed into place, so
/// a crash mid-write leaves the previous file intact.
#[derive(Debug)]
pub struct PrefsStore {
    path: PathBuf,
    data: Mutex<PrefsData>,
}

impl PrefsStore {
    /// Open the store at `path`, creating parent directories as needed. A
    /// missing file starts empty; a malformed one is an error rather than
    /// a silent reset.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| PrefsError::io("creating preferences directory", parent, source))?;
        }

        let data = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| PrefsError::JsonParse {
                path: path.clone(),
                source,
            })?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => PrefsData::default(),
            Err(source) => return Err(PrefsError::io("reading preferences file", &path, source)),
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn last_session_id(&self) -> Option<String> {
        self.lock().last_session_id.clone()
    }

    pub fn set_last_session_id(&self, session_id: Option<String>) -> Result<(), PrefsError> {
        self.mutate(|data| data.last_session_id = session_id)
    }

    #[must_use]
    pub fn last_model_id(&self) -> Option<String> {
        self.lock().last_model_id.clone()
    }

    pub fn set_last_model_id(&self, model_id: Option<String>) -> Result<(), PrefsError> {
        self.mutate(|data| data.last_model_id = model_id)
    }

    #[must_use]
    pub fn scroll_offset(&self, session_id: &str) -> Option<f64> {
        self.lock().scroll_offsets.get(session_id).copied()
    }

    pub fn set_scroll_offset(&self, session_id: &str, offset: f64) -> Result<(), PrefsError> {
        self.mutate(|data| {
            data.scroll_offsets.insert(session_id.to_string(), offset);
        })
    }

    /// Drop everything remembered about one session. Called when the
    /// session is deleted on the server.
    pub fn remove_session_state(&self, session_id: &str) -> Result<(), PrefsError> {
        self.mutate(|data| {
            data.scroll_offsets.remove(session_id);
            if data.last_session_id.as_deref() == Some(session_id) {
                data.last_session_id = None;
            }
        })
    }

    fn mutate(&self, apply: impl FnOnce(&mut PrefsData)) -> Result<(), PrefsError> {
        let mut data = self.lock();
        apply(&mut data);
        self.persist(&data)
    }

    fn persist(&self, data: &PrefsData) -> Result<(), PrefsError> {
        let serialized =
            serde_json::to_vec_pretty(data).map_err(|source| PrefsError::JsonSerialize {
                path: self.path.clone(),
                source,
            })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serialized)
            .map_err(|source| PrefsError::io("writing preferences temp file", &tmp, source))?;
        fs::rename(&tmp, &self.path)
            .map_err(|source| PrefsError::io("replacing preferences file", &self.path, source))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PrefsData> {
        match self.data.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl TokenStore for PrefsStore {
    fn load(&self) -> Result<Option<TokenPair>, TokenStoreError> {
        Ok(self.lock().tokens.clone())
    }

    fn save(&self, tokens: &TokenPair) -> Result<(), TokenStoreError> {
        self.mutate(|data| data.tokens = Some(tokens.clone()))
            .map_err(|error| TokenStoreError(error.to_string()))
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.mutate(|data| data.tokens = None)
            .map_err(|error| TokenStoreError(error.to_string()))
    }
}
