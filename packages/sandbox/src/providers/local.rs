// ABOUTME: Local process execution provider used when no container runtime is reachable
// ABOUTME: Runs the command through the platform shell in its own process group

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use unison_core::MAX_CAPTURED_OUTPUT_BYTES;

use super::{push_bounded, ExecOutput, ExecRequest, ExecutionProvider, ProviderKind};
use crate::error::{Result, SandboxError};

/// How long to wait for the output pipes to close once the command exited
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

pub struct LocalProcessProvider {
    max_output_bytes: usize,
}

impl LocalProcessProvider {
    pub fn new() -> Self {
        Self::with_output_limit(MAX_CAPTURED_OUTPUT_BYTES)
    }

    pub fn with_output_limit(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    fn shell_command(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }

    /// Kill the command and everything it started
    async fn terminate(child: &mut Child, pid: Option<u32>) {
        #[cfg(unix)]
        {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
        }
        #[cfg(not(unix))]
        let _ = pid;

        if let Err(e) = child.kill().await {
            debug!("Child already gone while killing: {}", e);
        }
    }
}

impl Default for LocalProcessProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionProvider for LocalProcessProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    async fn run(&self, request: &ExecRequest) -> Result<ExecOutput> {
        let mut cmd = Self::shell_command(&request.command);
        cmd.current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            SandboxError::LaunchFailed(format!(
                "{} (in {}): {}",
                request.command,
                request.working_dir.display(),
                e
            ))
        })?;
        let pid = child.id();
        debug!(
            "Spawned local process {:?} for execution {}",
            pid, request.execution_id
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SandboxError::LaunchFailed("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SandboxError::LaunchFailed("stderr was not captured".to_string()))?;

        let stdout_task = tokio::spawn(read_bounded(stdout, self.max_output_bytes));
        let stderr_task = tokio::spawn(read_bounded(stderr, self.max_output_bytes));

        match tokio::time::timeout(request.timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;

                // Background children must not outlive the command
                #[cfg(unix)]
                {
                    if let Some(pid) = pid {
                        kill_process_group(pid);
                    }
                }

                let stdout = collect(stdout_task, &request.execution_id).await;
                let stderr = collect(stderr_task, &request.execution_id).await;

                Ok(ExecOutput {
                    exit_code: exit_code_of(status),
                    stdout,
                    stderr,
                })
            }
            Err(_) => {
                warn!(
                    "Execution {} exceeded {}s, killing process group {:?}",
                    request.execution_id,
                    request.timeout.as_secs(),
                    pid
                );
                Self::terminate(&mut child, pid).await;
                stdout_task.abort();
                stderr_task.abort();

                Err(SandboxError::Timeout {
                    seconds: request.timeout.as_secs(),
                })
            }
        }
    }
}

/// Read a stream to its end, keeping at most `limit` bytes.
/// Keeps draining past the limit so the writer never blocks on a full pipe.
async fn read_bounded<R>(mut reader: R, limit: usize) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => push_bounded(&mut captured, &chunk[..n], limit),
            Err(e) => {
                debug!("Stopped reading command output: {}", e);
                break;
            }
        }
    }
    captured
}

async fn collect(task: JoinHandle<Vec<u8>>, execution_id: &str) -> Vec<u8> {
    match tokio::time::timeout(OUTPUT_DRAIN_GRACE, task).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            warn!("Output reader for execution {} failed: {}", execution_id, e);
            Vec::new()
        }
        Err(_) => {
            warn!(
                "Output of execution {} still open after exit, dropping it",
                execution_id
            );
            Vec::new()
        }
    }
}

fn exit_code_of(status: ExitStatus) -> i64 {
    // Killed by a signal: no exit code
    status.code().map(i64::from).unwrap_or(-1)
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) => debug!("Sent SIGKILL to process group {}", pid),
        Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pid, e),
    }
}
