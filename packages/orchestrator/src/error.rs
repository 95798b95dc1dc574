// ABOUTME: Error types for the orchestrator
// ABOUTME: Caller-misuse errors are raised; strategy errors become failed task results

use std::any::Any;
use thiserror::Error;
use unison_core::ComponentCategory;
use unison_sessions::{SessionError, StorageError};

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("Task {0} was already submitted")]
    DuplicateTask(String),

    #[error("Session error: {0}")]
    Session(SessionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<SessionError> for OrchestratorError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::SessionNotFound(id) => OrchestratorError::SessionNotFound(id),
            SessionError::CheckpointNotFound(id) => OrchestratorError::CheckpointNotFound(id),
            other => OrchestratorError::Session(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Failure inside a mode strategy. Never leaves `execute_task`.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Generation of {category} component failed: {message}")]
    Generation {
        category: ComponentCategory,
        message: String,
    },

    #[error("Delegation failed: {0}")]
    Delegation(String),

    #[error("Workspace unavailable: {0}")]
    Workspace(String),

    #[error("Strategy panicked: {0}")]
    Panicked(String),
}

impl StrategyError {
    /// Build from the payload of a caught panic
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        StrategyError::Panicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_not_found_is_lifted() {
        let err: OrchestratorError = SessionError::SessionNotFound("s1".to_string()).into();
        assert!(matches!(err, OrchestratorError::SessionNotFound(id) if id == "s1"));

        let err: OrchestratorError = SessionError::CheckpointNotFound("c1".to_string()).into();
        assert!(matches!(err, OrchestratorError::CheckpointNotFound(id) if id == "c1"));
    }

    #[test]
    fn test_strategy_error_messages() {
        let err = StrategyError::Generation {
            category: ComponentCategory::Database,
            message: "template missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Generation of database component failed: template missing"
        );
    }

    #[test]
    fn test_panic_payload_becomes_message() {
        let err = StrategyError::from_panic(Box::new("generator exploded"));
        assert_eq!(err.to_string(), "Strategy panicked: generator exploded");

        let err = StrategyError::from_panic(Box::new(String::from("owned message")));
        assert!(matches!(err, StrategyError::Panicked(m) if m == "owned message"));

        let err = StrategyError::from_panic(Box::new(42u8));
        assert!(matches!(err, StrategyError::Panicked(m) if m == "unknown panic payload"));
    }
}
