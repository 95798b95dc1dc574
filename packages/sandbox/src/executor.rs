// ABOUTME: Sandboxed executor running agent commands through the provider chosen at startup
// ABOUTME: Every outcome, including timeouts and launch failures, comes back as an ExecutionResult

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use unison_core::{
    generate_execution_id, ExecutionFailure, ExecutionResult, ParseError, DEFAULT_SANDBOX_IMAGE,
};

use crate::error::SandboxError;
use crate::providers::{
    DockerProvider, ExecRequest, ExecutionProvider, LocalProcessProvider, ProviderKind,
};

/// Which provider the executor may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyPreference {
    /// Container when the runtime answers, local process otherwise
    #[default]
    Auto,
    Container,
    Local,
}

impl fmt::Display for StrategyPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyPreference::Auto => write!(f, "auto"),
            StrategyPreference::Container => write!(f, "container"),
            StrategyPreference::Local => write!(f, "local"),
        }
    }
}

impl FromStr for StrategyPreference {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "container" | "docker" => Ok(Self::Container),
            "local" => Ok(Self::Local),
            _ => Err(ParseError::UnknownStrategy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxSettings {
    pub strategy: StrategyPreference,
    pub image: String,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyPreference::Auto,
            image: DEFAULT_SANDBOX_IMAGE.to_string(),
        }
    }
}

/// Runs shell commands inside an isolation boundary rooted at a workspace
#[derive(Clone)]
pub struct SandboxedExecutor {
    workspace_root: PathBuf,
    provider: Arc<dyn ExecutionProvider>,
}

impl SandboxedExecutor {
    /// Pick the provider once. With `Auto` or `Container`, an unreachable
    /// container runtime falls back to a local process.
    pub async fn initialize(workspace_root: impl Into<PathBuf>, settings: &SandboxSettings) -> Self {
        let workspace_root = workspace_root.into();
        if let Err(e) = tokio::fs::create_dir_all(&workspace_root).await {
            warn!(
                "Could not create workspace root {}: {}",
                workspace_root.display(),
                e
            );
        }

        let provider: Arc<dyn ExecutionProvider> = match settings.strategy {
            StrategyPreference::Local => Arc::new(LocalProcessProvider::new()),
            StrategyPreference::Auto | StrategyPreference::Container => {
                match DockerProvider::connect(settings.image.clone()).await {
                    Ok(docker) => Arc::new(docker),
                    Err(e) => {
                        warn!(
                            "Container runtime unavailable ({}), using local process execution",
                            e
                        );
                        Arc::new(LocalProcessProvider::new())
                    }
                }
            }
        };

        info!(
            "Sandboxed executor ready: provider={}, workspace_root={}",
            provider.kind(),
            workspace_root.display()
        );

        Self {
            workspace_root,
            provider,
        }
    }

    /// Use an explicit provider, skipping runtime detection
    pub fn with_provider(
        workspace_root: impl Into<PathBuf>,
        provider: Arc<dyn ExecutionProvider>,
    ) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            provider,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    /// Run `command` in `working_dir` (the workspace root when absent).
    ///
    /// Never fails: a timeout reports exit code -1 with a duration of exactly
    /// the timeout, and a command that could not start reports exit code -1.
    pub async fn execute(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout_seconds: u64,
    ) -> ExecutionResult {
        let request = ExecRequest {
            execution_id: generate_execution_id(),
            command: command.to_string(),
            working_dir: working_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.workspace_root.clone()),
            timeout: Duration::from_secs(timeout_seconds),
        };
        debug!(
            "Executing {} via {}: {}",
            request.execution_id,
            self.provider.kind(),
            request.command
        );

        let started = Instant::now();
        let outcome = self.provider.run(&request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                let success = output.exit_code == 0;
                debug!(
                    "Execution {} exited with {} after {}ms",
                    request.execution_id, output.exit_code, elapsed_ms
                );
                ExecutionResult {
                    execution_id: request.execution_id,
                    success,
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.exit_code,
                    duration_ms: elapsed_ms,
                    failure: (!success).then_some(ExecutionFailure::NonZeroExit),
                }
            }
            Err(SandboxError::Timeout { seconds }) => ExecutionResult {
                execution_id: request.execution_id,
                success: false,
                stdout: String::new(),
                stderr: format!("Command timed out after {} seconds", seconds),
                exit_code: -1,
                duration_ms: timeout_seconds.saturating_mul(1000),
                failure: Some(ExecutionFailure::Timeout),
            },
            Err(e) => {
                error!("Execution {} could not run: {}", request.execution_id, e);
                ExecutionResult {
                    execution_id: request.execution_id,
                    success: false,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    exit_code: -1,
                    duration_ms: elapsed_ms,
                    failure: Some(ExecutionFailure::LaunchFailure),
                }
            }
        }
    }
}
