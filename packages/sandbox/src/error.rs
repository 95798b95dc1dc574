// ABOUTME: Error types for sandboxed execution
// ABOUTME: Provider failures surfaced to the executor, never to callers of execute

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Command timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Failed to launch command: {0}")]
    LaunchFailed(String),

    #[error("Provider not available: {0}")]
    NotAvailable(String),

    #[error("Container error: {0}")]
    ContainerError(String),

    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
