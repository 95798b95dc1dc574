// ABOUTME: Docker execution provider using the Bollard API
// ABOUTME: Runs each command in a disposable, network-less container with the workspace bind-mounted

use async_trait::async_trait;
use bollard::{
    container::{
        Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
        RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
    },
    image::CreateImageOptions,
    models::HostConfig,
    Docker,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use unison_core::{MAX_CAPTURED_OUTPUT_BYTES, WORKSPACE_MOUNT_POINT};

use super::{push_bounded, ExecOutput, ExecRequest, ExecutionProvider, ProviderKind};
use crate::error::{Result, SandboxError};

/// Label marking containers started by this provider
const MANAGED_LABEL: &str = "unison.managed";
const EXECUTION_LABEL: &str = "unison.execution_id";

pub struct DockerProvider {
    client: Docker,
    image: String,
    max_output_bytes: usize,
}

impl DockerProvider {
    /// Connect to the local Docker daemon and make sure it answers
    pub async fn connect(image: impl Into<String>) -> Result<Self> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| SandboxError::NotAvailable(e.to_string()))?;
        client
            .ping()
            .await
            .map_err(|e| SandboxError::NotAvailable(e.to_string()))?;

        Ok(Self::with_client(client, image))
    }

    pub fn with_client(client: Docker, image: impl Into<String>) -> Self {
        Self {
            client,
            image: image.into(),
            max_output_bytes: MAX_CAPTURED_OUTPUT_BYTES,
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    /// Pull the image unless it is already present
    async fn ensure_image(&self) -> Result<()> {
        match self.client.inspect_image(&self.image).await {
            Ok(_) => return Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => return Err(SandboxError::Docker(e)),
        }

        info!("Pulling sandbox image {}", self.image);
        let options = CreateImageOptions {
            from_image: self.image.clone(),
            ..Default::default()
        };
        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| {
                SandboxError::LaunchFailed(format!("failed to pull {}: {}", self.image, e))
            })?;
        }
        Ok(())
    }

    fn container_config(&self, request: &ExecRequest, host_dir: &Path) -> Config<String> {
        let mut labels = HashMap::new();
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
        labels.insert(EXECUTION_LABEL.to_string(), request.execution_id.clone());

        let host_config = HostConfig {
            binds: Some(vec![format!(
                "{}:{}:rw",
                host_dir.display(),
                WORKSPACE_MOUNT_POINT
            )]),
            network_mode: Some("none".to_string()),
            cap_drop: Some(vec!["ALL".to_string()]),
            privileged: Some(false),
            ..Default::default()
        };

        Config {
            image: Some(self.image.clone()),
            cmd: Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                request.command.clone(),
            ]),
            working_dir: Some(WORKSPACE_MOUNT_POINT.to_string()),
            labels: Some(labels),
            network_disabled: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            host_config: Some(host_config),
            ..Default::default()
        }
    }

    async fn run_container(
        &self,
        container_id: &str,
        request: &ExecRequest,
        deadline: Instant,
    ) -> Result<ExecOutput> {
        within(
            deadline,
            request.timeout,
            self.client
                .start_container(container_id, None::<StartContainerOptions<String>>),
        )
        .await?
        .map_err(|e| SandboxError::LaunchFailed(e.to_string()))?;

        let wait = async {
            let mut stream = self.client.wait_container(
                container_id,
                Some(WaitContainerOptions {
                    condition: "not-running",
                }),
            );
            match stream.next().await {
                Some(Ok(response)) => Ok(response.status_code),
                // Bollard reports a non-zero exit as a wait error
                Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => {
                    Ok(code)
                }
                Some(Err(e)) => Err(SandboxError::Docker(e)),
                None => Err(SandboxError::ContainerError(format!(
                    "wait stream for container {} ended without a status",
                    container_id
                ))),
            }
        };

        match tokio::time::timeout_at(deadline, wait).await {
            Ok(exit_code) => {
                let exit_code = exit_code?;
                let (stdout, stderr) = self.collect_logs(container_id).await?;
                Ok(ExecOutput {
                    exit_code,
                    stdout,
                    stderr,
                })
            }
            Err(_) => {
                warn!(
                    "Execution {} exceeded {}s, killing container {}",
                    request.execution_id,
                    request.timeout.as_secs(),
                    container_id
                );
                if let Err(e) = self
                    .client
                    .kill_container(
                        container_id,
                        Some(KillContainerOptions { signal: "SIGKILL" }),
                    )
                    .await
                {
                    debug!("Kill of container {} failed: {}", container_id, e);
                }
                Err(SandboxError::Timeout {
                    seconds: request.timeout.as_secs(),
                })
            }
        }
    }

    async fn collect_logs(&self, container_id: &str) -> Result<(Vec<u8>, Vec<u8>)> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            ..Default::default()
        };

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut stream = self.client.logs(container_id, Some(options));
        while let Some(chunk) = stream.next().await {
            match chunk? {
                LogOutput::StdOut { message } | LogOutput::Console { message } => {
                    push_bounded(&mut stdout, &message, self.max_output_bytes)
                }
                LogOutput::StdErr { message } => {
                    push_bounded(&mut stderr, &message, self.max_output_bytes)
                }
                _ => {}
            }
        }
        Ok((stdout, stderr))
    }

    /// Force-remove the container. Failures are logged, never surfaced.
    async fn discard(&self, container_id: &str) {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        match self
            .client
            .remove_container(container_id, Some(options))
            .await
        {
            Ok(()) => debug!("Removed container {}", container_id),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => warn!("Failed to remove container {}: {}", container_id, e),
        }
    }
}

#[async_trait]
impl ExecutionProvider for DockerProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Container
    }

    async fn run(&self, request: &ExecRequest) -> Result<ExecOutput> {
        // Pulling, creating and starting the container all count against the timeout
        let deadline = Instant::now() + request.timeout;
        within(deadline, request.timeout, self.ensure_image()).await??;

        // Docker needs an absolute host path for the bind mount
        let host_dir = tokio::fs::canonicalize(&request.working_dir)
            .await
            .map_err(|e| {
                SandboxError::LaunchFailed(format!(
                    "working directory {}: {}",
                    request.working_dir.display(),
                    e
                ))
            })?;

        let name = format!("unison-{}", request.execution_id);
        let create = self.client.create_container(
            Some(CreateContainerOptions {
                name: name.clone(),
                platform: None,
            }),
            self.container_config(request, &host_dir),
        );
        let created = match within(deadline, request.timeout, create).await {
            Ok(created) => created.map_err(|e| SandboxError::LaunchFailed(e.to_string()))?,
            Err(e) => {
                // The daemon may still finish creating it
                self.discard(&name).await;
                return Err(e);
            }
        };
        debug!(
            "Created container {} ({}) for execution {}",
            name, created.id, request.execution_id
        );

        let outcome = self.run_container(&created.id, request, deadline).await;
        self.discard(&created.id).await;
        outcome
    }
}

/// Await `fut` until `deadline`, reporting expiry as a timeout of `timeout`
async fn within<F: Future>(deadline: Instant, timeout: Duration, fut: F) -> Result<F::Output> {
    tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| SandboxError::Timeout {
            seconds: timeout.as_secs(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn provider() -> Option<DockerProvider> {
        Docker::connect_with_local_defaults()
            .ok()
            .map(|client| DockerProvider::with_client(client, "python:3.12-slim"))
    }

    #[test]
    fn test_container_config_isolates_network_and_mounts_workspace() {
        let Some(provider) = provider() else {
            return;
        };
        let request = ExecRequest {
            execution_id: "exec_abc".to_string(),
            command: "ls -la".to_string(),
            working_dir: PathBuf::from("/tmp/ws"),
            timeout: Duration::from_secs(30),
        };

        let config = provider.container_config(&request, Path::new("/tmp/ws"));
        let host = config.host_config.unwrap();

        assert_eq!(host.network_mode.as_deref(), Some("none"));
        assert_eq!(host.binds.unwrap(), vec!["/tmp/ws:/workspace:rw".to_string()]);
        assert_eq!(host.cap_drop.unwrap(), vec!["ALL".to_string()]);
        assert_eq!(config.working_dir.as_deref(), Some("/workspace"));
        assert_eq!(
            config.cmd.unwrap(),
            vec!["sh".to_string(), "-c".to_string(), "ls -la".to_string()]
        );
        assert_eq!(
            config.labels.unwrap().get(EXECUTION_LABEL).map(String::as_str),
            Some("exec_abc")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_steps_share_the_request_deadline() {
        let timeout = Duration::from_secs(5);
        let deadline = Instant::now() + timeout;

        // A slow pull eats most of the budget
        within(deadline, timeout, tokio::time::sleep(Duration::from_secs(4)))
            .await
            .unwrap();

        // so a step that would fit the full timeout on its own still expires
        let err = within(deadline, timeout, tokio::time::sleep(Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::Timeout { seconds: 5 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_finishing_before_deadline_keeps_its_output() {
        let timeout = Duration::from_secs(30);
        let deadline = Instant::now() + timeout;

        let value = within(deadline, timeout, async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }
}
