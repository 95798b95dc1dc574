// ABOUTME: Error types for session management and workspace snapshots
// ABOUTME: Per-file capture and restore problems are reported, not raised

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot task failed: {0}")]
    TaskFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("Cannot restore into checkpoint {0}")]
    CheckpointTarget(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
