//! Server-side sessions
//!
//! A browser is tied to its session by a signed cookie holding a random
//! id; all session state lives in a [`SessionStore`].
//!
//! Persistence rules:
//! - a session nobody wrote to is never stored (no cookie either)
//! - an unchanged session is not rewritten
//! - the cookie is only sent when a session is first stored or its id changes

mod layer;
mod store;
pub mod token;

pub use layer::{SessionManager, manage_sessions};
pub use store::{MemoryStore, Record, SessionId, SessionStore, StorageError};

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    /// `None` until the session is first stored
    id: Option<SessionId>,
    data: HashMap<String, Value>,
    expires_at: Option<DateTime<Utc>>,
    dirty: bool,
    cycle_id: bool,
    destroyed: bool,
}

/// Handle to the session of the current request
///
/// Cheap to clone; all clones share the same state. Changes are written
/// to the store by the session layer once the handler has finished.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    /// A session that has not been stored yet
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            store,
        }
    }

    /// A session loaded from the store
    pub fn from_record(id: SessionId, record: Record, store: Arc<dyn SessionStore>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                id: Some(id),
                data: record.data,
                expires_at: record.expires_at,
                ..Inner::default()
            })),
            store,
        }
    }

    /// Id of the stored session, `None` for a session not yet stored
    pub async fn id(&self) -> Option<SessionId> {
        self.inner.lock().await.id.clone()
    }

    /// Read a value
    ///
    /// # Errors
    /// Returns error if the stored value does not decode as `T`
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let inner = self.inner.lock().await;
        inner
            .data
            .get(key)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(StorageError::from)
    }

    /// Write a value, marking the session for persistence
    pub async fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value)?;
        let mut inner = self.inner.lock().await;
        inner.data.insert(key.to_string(), value);
        inner.dirty = true;
        Ok(())
    }

    /// Remove a value and return it
    pub async fn remove<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let mut inner = self.inner.lock().await;
        let Some(value) = inner.data.remove(key) else {
            return Ok(None);
        };
        inner.dirty = true;
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Remove every value
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.data.is_empty() {
            inner.data.clear();
            inner.dirty = true;
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.data.is_empty()
    }

    /// Move the session to a fresh id when it is next saved
    ///
    /// The record under the old id is deleted at that point.
    pub async fn cycle_id(&self) {
        let mut inner = self.inner.lock().await;
        inner.cycle_id = true;
        inner.dirty = true;
    }

    /// Delete the session from the store
    ///
    /// The in-memory state is cleared and nothing is written back for
    /// this request.
    ///
    /// # Errors
    /// Returns error if the store fails to delete the record; the
    /// session is left untouched in that case.
    pub async fn destroy(&self) -> Result<(), StorageError> {
        let id = self.inner.lock().await.id.clone();
        if let Some(id) = &id {
            self.store.delete(id).await?;
        }

        let mut inner = self.inner.lock().await;
        inner.data.clear();
        inner.dirty = false;
        inner.destroyed = true;
        Ok(())
    }

    pub async fn is_destroyed(&self) -> bool {
        self.inner.lock().await.destroyed
    }
}
