// ABOUTME: Core types, constants, and utilities for Unison
// ABOUTME: Foundational package holding the data model shared by the orchestration crates

pub mod constants;
pub mod types;
pub mod utils;

// Re-export main types
pub use types::{
    AgentAction, AgentRole, AutonomousOutput, ComponentCategory, ExecutionFailure, ExecutionMode,
    ExecutionResult, GeneratedComponent, GenerativeOutput, HybridOutput, IsolatedOutput,
    ParseError, TaskContext, TaskOutput, TaskResult, TaskStatus,
};

// Re-export constants
pub use constants::{
    sessions_dir, unison_dir, workspaces_dir, DEFAULT_EXEC_TIMEOUT_SECS, DEFAULT_SANDBOX_IMAGE,
    MAX_CAPTURED_OUTPUT_BYTES, SNAPSHOT_FILE_SIZE_LIMIT, WORKSPACE_MOUNT_POINT,
};

// Re-export utilities
pub use utils::{generate_action_id, generate_execution_id, generate_session_id, generate_task_id};
