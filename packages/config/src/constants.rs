// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Unison

// Filesystem Layout
pub const UNISON_HOME: &str = "UNISON_HOME";
pub const UNISON_WORKSPACE_ROOT: &str = "UNISON_WORKSPACE_ROOT";
pub const UNISON_STORAGE_PATH: &str = "UNISON_STORAGE_PATH";

// Checkpoint Storage
pub const UNISON_STORE_BACKEND: &str = "UNISON_STORE_BACKEND";

// Sandboxed Execution
pub const UNISON_EXEC_TIMEOUT_SECS: &str = "UNISON_EXEC_TIMEOUT_SECS";
pub const UNISON_SANDBOX_STRATEGY: &str = "UNISON_SANDBOX_STRATEGY";
pub const UNISON_SANDBOX_IMAGE: &str = "UNISON_SANDBOX_IMAGE";

// Logging
pub const RUST_LOG: &str = "RUST_LOG";

// System Environment Variables
pub const HOME: &str = "HOME";
pub const USERPROFILE: &str = "USERPROFILE"; // Windows
