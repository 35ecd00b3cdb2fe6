//! Autosaved, not-yet-submitted form snapshots.
//!
//! Drafts are best-effort: a failed write or an unreadable entry is logged and otherwise
//! treated as "no draft", never as an error for the person editing.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::models::RecipeId;

/// Drafts older than this are ignored and purged.
pub const DRAFT_TTL_HOURS: i64 = 24;
/// Quiet period after the last edit before a draft is written.
pub const AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(1000);

const STORAGE_PREFIX: &str = "recipe-draft-";

/// Which form a draft belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftKey {
    Create,
    Edit(RecipeId),
}

impl std::fmt::Display for DraftKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DraftKey::Create => write!(f, "create"),
            DraftKey::Edit(id) => write!(f, "edit-{}", id),
        }
    }
}

impl std::str::FromStr for DraftKey {
    type Err = DraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(DraftKey::Create),
            _ => s
                .strip_prefix("edit-")
                .and_then(|id| id.parse().ok())
                .map(DraftKey::Edit)
                .ok_or_else(|| DraftError::InvalidKey(s.to_string())),
        }
    }
}

impl DraftKey {
    fn storage_key(&self) -> String {
        format!("{STORAGE_PREFIX}{self}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft<T> {
    pub data: T,
    pub saved_at: DateTime<Utc>,
}

impl<T> Draft<T> {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.saved_at > chrono::Duration::hours(DRAFT_TTL_HOURS)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DraftError {
    #[error("Invalid draft key: {0}")]
    InvalidKey(String),
    #[error("Draft storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Draft encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Draft storage error: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// A string key-value store, shaped like browser local storage.
pub trait DraftStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, DraftError>;
    fn set(&self, key: &str, value: &str) -> Result<(), DraftError>;
    fn remove(&self, key: &str) -> Result<(), DraftError>;
}

#[derive(Debug, Default)]
pub struct MemoryDraftStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl DraftStorage for MemoryDraftStorage {
    fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DraftError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DraftError> {
        self.lock().remove(key);
        Ok(())
    }
}

impl MemoryDraftStorage {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map still holds usable strings.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileDraftStorage {
    dir: PathBuf,
}

impl FileDraftStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, DraftError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> Result<PathBuf, DraftError> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DraftError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl DraftStorage for FileDraftStorage {
    fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
        match std::fs::read_to_string(self.path(key)?) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DraftError> {
        // Write then rename, so a crash never leaves half a draft behind.
        let path = self.path(key)?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)?;
        std::io::Write::write_all(&mut temp, value.as_bytes())?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DraftError> {
        match std::fs::remove_file(self.path(key)?) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Typed, TTL-aware access to drafts on top of a [`DraftStorage`].
pub struct DraftStore<S> {
    storage: Arc<S>,
}

impl<S> Clone for DraftStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<S: DraftStorage> DraftStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The latest draft for `key`, if there is one younger than the TTL.
    pub fn load<T: DeserializeOwned>(&self, key: &DraftKey) -> Option<Draft<T>> {
        self.load_at(key, Utc::now())
    }

    /// Like [`DraftStore::load`], with an explicit notion of "now".
    ///
    /// Expired and unreadable drafts are removed on the way.
    pub fn load_at<T: DeserializeOwned>(
        &self,
        key: &DraftKey,
        now: DateTime<Utc>,
    ) -> Option<Draft<T>> {
        let storage_key = key.storage_key();
        let text = match self.storage.get(&storage_key) {
            Ok(text) => text?,
            Err(e) => {
                tracing::warn!(%key, "Could not read draft: {e}");
                return None;
            }
        };
        match serde_json::from_str::<Draft<T>>(&text) {
            Ok(draft) if !draft.is_expired(now) => Some(draft),
            Ok(_) => {
                tracing::debug!(%key, "Discarding expired draft");
                self.clear(key);
                None
            }
            Err(e) => {
                tracing::warn!(%key, "Discarding unreadable draft: {e}");
                self.clear(key);
                None
            }
        }
    }

    /// Write a snapshot right away, stamped with the current time.
    pub fn save<T: Serialize>(&self, key: &DraftKey, data: &T) {
        self.save_at(key, data, Utc::now())
    }

    pub fn save_at<T: Serialize>(&self, key: &DraftKey, data: &T, saved_at: DateTime<Utc>) {
        let written = serde_json::to_string(&Draft { data, saved_at })
            .map_err(DraftError::from)
            .and_then(|text| self.storage.set(&key.storage_key(), &text));
        if let Err(e) = written {
            tracing::warn!(%key, "Could not save draft: {e}");
        }
    }

    pub fn clear(&self, key: &DraftKey) {
        if let Err(e) = self.storage.remove(&key.storage_key()) {
            tracing::warn!(%key, "Could not clear draft: {e}");
        }
    }
}

/// Debounced autosave for one form.
///
/// Each call to [`DraftAutosaver::schedule`] cancels the pending write and arms a new
/// one, so a burst of edits results in a single write of the latest snapshot once the
/// form has been quiet for the debounce delay. Dropping the autosaver cancels any
/// pending write.
pub struct DraftAutosaver<S, T> {
    store: DraftStore<S>,
    key: DraftKey,
    latest: Arc<Mutex<Option<T>>>,
    pending: Option<JoinHandle<()>>,
}

impl<S, T> DraftAutosaver<S, T>
where
    S: DraftStorage + 'static,
    T: Serialize + Send + 'static,
{
    pub fn new(store: DraftStore<S>, key: DraftKey) -> Self {
        Self {
            store,
            key,
            latest: Default::default(),
            pending: None,
        }
    }

    /// Queue `snapshot` to be written after the debounce delay. Must run inside a tokio runtime.
    pub fn schedule(&mut self, snapshot: T) {
        self.abort_pending();
        *lock(&self.latest) = Some(snapshot);
        let store = self.store.clone();
        let key = self.key;
        let latest = self.latest.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(AUTOSAVE_DEBOUNCE).await;
            let snapshot = lock(&latest).take();
            if let Some(snapshot) = snapshot {
                store.save(&key, &snapshot);
            }
        }));
    }

    /// Write the pending snapshot now, if any.
    pub fn flush(&mut self) {
        self.abort_pending();
        let snapshot = lock(&self.latest).take();
        if let Some(snapshot) = snapshot {
            self.store.save(&self.key, &snapshot);
        }
    }

    /// Forget the pending snapshot without writing it.
    pub fn cancel(&mut self) {
        self.abort_pending();
        lock(&self.latest).take();
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.latest).is_some()
    }

    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<S, T> Drop for DraftAutosaver<S, T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

fn lock<T>(slot: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}
