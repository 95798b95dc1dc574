// ABOUTME: Session lifecycle and workspace checkpointing for Unison
// ABOUTME: Captures and restores workspaces and persists session documents durably

pub mod error;
pub mod manager;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod vcs;

pub use error::{SessionError, SessionResult, SnapshotError};
pub use manager::{RestoreOutcome, SessionManager};
pub use snapshot::{
    capture, capture_workspace, restore, restore_workspace, CaptureReport, RestoreReport,
    SkipReason, SkippedEntry, StructureEntry, WorkspaceSnapshot,
};
pub use state::{checkpoint_id_prefix, is_checkpoint_id_of, CheckpointSummary, SessionState};
pub use storage::{
    factory::StorageFactory, json::JsonFileStore, sqlite::SqliteSessionStore, SessionStore,
    StorageError, StorageResult, StoreBackend,
};
pub use vcs::{vcs_status, VcsStatus};
