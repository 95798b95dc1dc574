// ABOUTME: Orchestrator facade routing tasks to mode strategies
// ABOUTME: Owns per-session transparency logs, task bookkeeping and metrics

use futures::FutureExt;
use serde_json::json;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};
use unison_core::{AgentAction, AgentRole, TaskContext, TaskResult, TaskStatus};
use unison_sandbox::{ProviderKind, SandboxedExecutor};
use unison_sessions::{CheckpointSummary, SessionManager, SessionStore, StorageFactory};
use unison_transparency::{TransparencyExport, TransparencyLog, TransparencySubscriber};

use crate::collaborators::{AgentDelegate, ComponentGenerator, NoopDelegate, TemplateGenerator};
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result, StrategyError};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::strategy::{self, StrategyContext};

pub struct Orchestrator {
    config: OrchestratorConfig,
    sessions: SessionManager,
    executor: SandboxedExecutor,
    generator: Arc<dyn ComponentGenerator>,
    delegate: Arc<dyn AgentDelegate>,
    logs: RwLock<HashMap<String, Arc<TransparencyLog>>>,
    tasks: RwLock<HashMap<String, TaskStatus>>,
    metrics: RwLock<Metrics>,
}

impl Orchestrator {
    /// Open the configured store and pick the sandbox provider
    pub async fn new(config: OrchestratorConfig) -> Result<Self> {
        let store = StorageFactory::create_store(&config.store_backend()).await?;
        let executor = SandboxedExecutor::initialize(&config.workspace_root, &config.sandbox).await;
        Ok(Self::from_parts(config, store, executor))
    }

    pub fn from_parts(
        config: OrchestratorConfig,
        store: Arc<dyn SessionStore>,
        executor: SandboxedExecutor,
    ) -> Self {
        Self {
            sessions: SessionManager::new(&config.workspace_root, store),
            config,
            executor,
            generator: Arc::new(TemplateGenerator),
            delegate: Arc::new(NoopDelegate),
            logs: RwLock::new(HashMap::new()),
            tasks: RwLock::new(HashMap::new()),
            metrics: RwLock::new(Metrics::default()),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn ComponentGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn AgentDelegate>) -> Self {
        self.delegate = delegate;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn sandbox_provider(&self) -> ProviderKind {
        self.executor.provider_kind()
    }

    pub fn session_workspace(&self, session_id: &str) -> PathBuf {
        self.sessions.workspace_path(session_id)
    }

    pub async fn create_session(&self, user_id: &str) -> Result<String> {
        let session_id = self.sessions.create_session(user_id).await?;
        self.logs.write().await.insert(
            session_id.clone(),
            Arc::new(TransparencyLog::new(&session_id)),
        );
        Ok(session_id)
    }

    /// Run one task to completion. Strategy failures come back as a failed
    /// `TaskResult`; only an unknown session or a resubmitted task id is an error.
    pub async fn execute_task(&self, session_id: &str, task: TaskContext) -> Result<TaskResult> {
        let log = self.log_for(session_id).await?;

        {
            let mut tasks = self.tasks.write().await;
            if tasks.contains_key(&task.task_id) {
                return Err(OrchestratorError::DuplicateTask(task.task_id.clone()));
            }
            tasks.insert(task.task_id.clone(), TaskStatus::Pending);
        }

        let started = Instant::now();
        self.set_status(&task.task_id, TaskStatus::Running).await;
        self.sessions.begin_task(session_id, &task).await;

        info!(
            "Executing task {} ({}) in session {}",
            task.task_id, task.execution_mode, session_id
        );
        log.append(
            AgentAction::new(
                AgentRole::Orchestrator,
                "task_start",
                format!("Starting task: {}", task.description),
            )
            .with_input(json!({
                "task_id": task.task_id,
                "execution_mode": task.execution_mode,
                "assigned_roles": task.assigned_roles,
            })),
        )
        .await;

        let ctx = StrategyContext {
            log: &log,
            executor: &self.executor,
            generator: self.generator.as_ref(),
            delegate: self.delegate.as_ref(),
            workspace: task
                .workspace_path
                .clone()
                .unwrap_or_else(|| self.sessions.workspace_path(session_id)),
            default_timeout_secs: self.config.exec_timeout_secs,
        };
        let outcome = AssertUnwindSafe(strategy::run(&ctx, &task))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(StrategyError::from_panic(payload)));
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(output) => {
                log.append(
                    AgentAction::new(
                        AgentRole::Orchestrator,
                        "task_complete",
                        format!("Task completed: {}", task.description),
                    )
                    .with_output(json!(output))
                    .with_duration_ms(duration_ms),
                )
                .await;
                self.metrics.write().await.record_success(duration_ms);
                self.set_status(&task.task_id, TaskStatus::Completed).await;
                info!("Task {} completed in {}ms", task.task_id, duration_ms);
                TaskResult::succeeded(&task.task_id, output, duration_ms)
            }
            Err(e) => {
                let message = e.to_string();
                log.append(
                    AgentAction::new(
                        AgentRole::Orchestrator,
                        "task_failed",
                        format!("Task failed: {}", task.description),
                    )
                    .with_duration_ms(duration_ms)
                    .failed(&message),
                )
                .await;
                self.metrics.write().await.record_failure();
                self.set_status(&task.task_id, TaskStatus::Failed).await;
                warn!("Task {} failed: {}", task.task_id, message);
                TaskResult::failed(&task.task_id, message, duration_ms)
            }
        };

        self.sessions.finish_task(session_id, &task.task_id).await;
        Ok(result)
    }

    /// Tasks currently running in a live session
    pub async fn active_tasks(&self, session_id: &str) -> Vec<TaskContext> {
        self.sessions.active_tasks(session_id).await
    }

    pub async fn task_status(&self, task_id: &str) -> Option<TaskStatus> {
        self.tasks.read().await.get(task_id).copied()
    }

    pub async fn get_transparency_log(
        &self,
        session_id: &str,
        role: Option<AgentRole>,
    ) -> Result<Vec<AgentAction>> {
        Ok(self.log_for(session_id).await?.query(role, None).await)
    }

    pub async fn subscribe_transparency<S>(&self, session_id: &str, subscriber: S) -> Result<()>
    where
        S: TransparencySubscriber + 'static,
    {
        self.log_for(session_id).await?.subscribe(subscriber).await;
        Ok(())
    }

    pub async fn subscribe_transparency_channel(
        &self,
        session_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<AgentAction>> {
        Ok(self.log_for(session_id).await?.subscribe_channel().await)
    }

    pub async fn export_transparency_log(&self, session_id: &str) -> Result<TransparencyExport> {
        Ok(self.log_for(session_id).await?.export().await)
    }

    pub async fn create_checkpoint(&self, session_id: &str, checkpoint_name: &str) -> Result<String> {
        let log = self.logs.read().await.get(session_id).cloned();
        let actions = match log {
            Some(log) => log.query(None, None).await,
            None => Vec::new(),
        };
        Ok(self
            .sessions
            .create_checkpoint(session_id, checkpoint_name, actions)
            .await?)
    }

    /// Restore a checkpoint into `target_session_id`, rebuilding its
    /// transparency log. `false` means some files could not be restored.
    pub async fn restore_session(
        &self,
        checkpoint_id: &str,
        target_session_id: &str,
    ) -> Result<bool> {
        let outcome = self
            .sessions
            .restore_checkpoint(checkpoint_id, target_session_id)
            .await?;

        let log = TransparencyLog::with_history(target_session_id, outcome.transparency_log.clone());
        self.logs
            .write()
            .await
            .insert(target_session_id.to_string(), Arc::new(log));

        for failure in &outcome.report.failed {
            warn!(
                "Could not restore {} into {} ({:?}): {}",
                failure.path,
                target_session_id,
                failure.reason,
                failure.detail.as_deref().unwrap_or("no detail")
            );
        }
        Ok(outcome.is_complete())
    }

    pub async fn list_checkpoints(&self, session_id: &str) -> Result<Vec<CheckpointSummary>> {
        Ok(self.sessions.list_checkpoints(session_id).await?)
    }

    pub async fn get_metrics(&self) -> MetricsSnapshot {
        let active_sessions = self.logs.read().await.len();
        self.metrics.read().await.snapshot(active_sessions)
    }

    async fn log_for(&self, session_id: &str) -> Result<Arc<TransparencyLog>> {
        self.logs
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::SessionNotFound(session_id.to_string()))
    }

    async fn set_status(&self, task_id: &str, status: TaskStatus) {
        self.tasks.write().await.insert(task_id.to_string(), status);
    }
}
