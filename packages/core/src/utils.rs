// ABOUTME: Shared utility functions for Unison
// ABOUTME: Identifier generation for sessions, tasks, actions, and executions

use uuid::Uuid;

/// Generate a new session id (bare UUID v4, matching the checkpoint id namespace)
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a new task id
pub fn generate_task_id() -> String {
    format!("task_{}", Uuid::new_v4().simple())
}

/// Generate a new transparency action id
pub fn generate_action_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a new sandbox execution id
pub fn generate_execution_id() -> String {
    format!("exec_{}", Uuid::new_v4().simple())
}
