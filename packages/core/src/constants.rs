use std::env;
use std::path::PathBuf;

use unison_config::constants::{
    HOME, UNISON_HOME, UNISON_STORAGE_PATH, UNISON_WORKSPACE_ROOT, USERPROFILE,
};

/// Default wall-clock bound for a sandboxed command
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 30;

/// Image used by the container execution strategy
pub const DEFAULT_SANDBOX_IMAGE: &str = "python:3.12-slim";

/// Mount point of the session workspace inside the sandbox container
pub const WORKSPACE_MOUNT_POINT: &str = "/workspace";

/// Per-stream cap on captured stdout/stderr
pub const MAX_CAPTURED_OUTPUT_BYTES: usize = 1024 * 1024;

/// Files at or above this size are left out of workspace snapshots (1 MiB)
pub const SNAPSHOT_FILE_SIZE_LIMIT: u64 = 1024 * 1024;

/// Get the path to the Unison directory (~/.unison)
pub fn unison_dir() -> PathBuf {
    if let Ok(home) = env::var(UNISON_HOME) {
        return PathBuf::from(home);
    }

    // HOME first (useful for tests), USERPROFILE on Windows, then the platform home directory
    env::var(HOME)
        .or_else(|_| env::var(USERPROFILE))
        .map(PathBuf::from)
        .ok()
        .or_else(dirs::home_dir)
        .unwrap_or_else(env::temp_dir)
        .join(".unison")
}

/// Root directory holding one workspace directory per session
pub fn workspaces_dir() -> PathBuf {
    env::var(UNISON_WORKSPACE_ROOT)
        .map(PathBuf::from)
        .unwrap_or_else(|_| unison_dir().join("workspaces"))
}

/// Directory holding durable session and checkpoint documents
pub fn sessions_dir() -> PathBuf {
    env::var(UNISON_STORAGE_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| unison_dir().join("sessions"))
}
