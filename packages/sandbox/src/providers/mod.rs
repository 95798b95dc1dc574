// ABOUTME: Provider trait and implementations for sandboxed command execution
// ABOUTME: A provider runs one shell command to completion inside its isolation boundary

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

pub mod docker;
pub mod local;

pub use docker::DockerProvider;
pub use local::LocalProcessProvider;

/// Which isolation boundary a provider uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Container,
    Local,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Container => write!(f, "container"),
            ProviderKind::Local => write!(f, "local"),
        }
    }
}

/// One command to run
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub execution_id: String,
    pub command: String,
    /// Host directory exposed to the command as its working directory
    pub working_dir: PathBuf,
    pub timeout: Duration,
}

/// Raw output of a command that ran to completion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Execution backend.
///
/// `run` returns `SandboxError::Timeout` once the request's timeout expires,
/// after making sure nothing the command started is still running.
#[async_trait]
pub trait ExecutionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn run(&self, request: &ExecRequest) -> Result<ExecOutput>;
}

/// Append `chunk` to `buf` without growing past `limit` bytes
pub(crate) fn push_bounded(buf: &mut Vec<u8>, chunk: &[u8], limit: usize) {
    let room = limit.saturating_sub(buf.len());
    let take = room.min(chunk.len());
    buf.extend_from_slice(&chunk[..take]);
}
