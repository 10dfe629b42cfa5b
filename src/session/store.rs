//! Session storage
//!
//! The store maps a session id to its record. It is injected into the
//! session layer so tests can swap in a store that misbehaves.

use axum::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Session store failure
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store could not complete the operation
    #[error("session backend error: {0}")]
    Backend(String),

    /// The session cookie could not be signed
    #[error("session cookie could not be signed: {0}")]
    Signing(String),

    /// A session value could not be encoded or decoded
    #[error("session data could not be encoded: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Opaque session identifier
///
/// 32 random bytes, URL-safe base64 without padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn random() -> Self {
        use base64::{Engine as _, engine::general_purpose};
        use rand::RngCore;

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-side state of one session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, Value>,
    /// When the record stops being valid; `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// Backing store for session records
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Fetch a record, `None` if the id is unknown
    async fn load(&self, id: &SessionId) -> Result<Option<Record>, StorageError>;

    /// Insert or replace a record
    async fn save(&self, id: &SessionId, record: &Record) -> Result<(), StorageError>;

    /// Remove a record; removing an unknown id is not an error
    async fn delete(&self, id: &SessionId) -> Result<(), StorageError>;
}

/// In-process session store
///
/// Volatile: every session is lost on restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<SessionId, Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Drop every expired record
    pub async fn prune_expired(&self) {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired());
        let removed = before - records.len();
        if removed > 0 {
            tracing::debug!(removed, "Pruned expired sessions");
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Record>, StorageError> {
        let records = self.records.read().await;
        Ok(records
            .get(id)
            .filter(|record| !record.is_expired())
            .cloned())
    }

    async fn save(&self, id: &SessionId, record: &Record) -> Result<(), StorageError> {
        self.records
            .write()
            .await
            .insert(id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StorageError> {
        self.records.write().await.remove(id);
        Ok(())
    }
}
