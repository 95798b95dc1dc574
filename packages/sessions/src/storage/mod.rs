// ABOUTME: Durable storage contract for session and checkpoint documents
// ABOUTME: Backed by SQLite by default, or one JSON file per document

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::state::{CheckpointSummary, SessionState};

pub mod factory;
pub mod json;
pub mod sqlite;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid document id: {0}")]
    InvalidId(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Where session documents live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite { path: PathBuf },
    Json { dir: PathBuf },
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn initialize(&self) -> StorageResult<()>;

    /// Insert or replace the document keyed by `state.session_id`
    async fn save(&self, state: &SessionState) -> StorageResult<()>;

    /// `Ok(None)` when no document has this id
    async fn load(&self, id: &str) -> StorageResult<Option<SessionState>>;

    /// Checkpoints derived from `session_id`, oldest first
    async fn list_checkpoints(&self, session_id: &str) -> StorageResult<Vec<CheckpointSummary>>;
}

/// Ids become file names and lookup keys, so keep them to a safe alphabet
pub(crate) fn validate_id(id: &str) -> StorageResult<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidId(id.to_string()))
    }
}
