// ABOUTME: Session lifecycle: workspaces, persisted state, active tasks, and checkpoints
// ABOUTME: Checkpoints are stored under ids namespaced by their originating session

use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use unison_core::{generate_session_id, AgentAction, TaskContext};

use crate::error::{SessionError, SessionResult};
use crate::snapshot::{self, RestoreReport};
use crate::state::{checkpoint_id_prefix, CheckpointSummary, SessionState};
use crate::storage::{validate_id, SessionStore};

/// What a restore did to its target session
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub target_session_id: String,
    pub report: RestoreReport,
    /// Transparency log carried by the checkpoint
    pub transparency_log: Vec<AgentAction>,
    /// True when the target id was unknown and a session was created for it
    pub adopted: bool,
}

impl RestoreOutcome {
    pub fn is_complete(&self) -> bool {
        self.report.is_complete()
    }
}

pub struct SessionManager {
    workspace_root: PathBuf,
    store: Arc<dyn SessionStore>,
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl SessionManager {
    pub fn new(workspace_root: impl Into<PathBuf>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            store,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// The single live workspace of a session
    pub fn workspace_path(&self, session_id: &str) -> PathBuf {
        self.workspace_root.join(session_id)
    }

    /// Allocate a workspace and persist a fresh session for `user_id`
    pub async fn create_session(&self, user_id: &str) -> SessionResult<String> {
        let session_id = generate_session_id();
        let workspace = self.workspace_path(&session_id);
        tokio::fs::create_dir_all(&workspace).await?;

        let state = SessionState::new(&session_id, user_id);
        self.store.save(&state).await?;
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), state);

        info!(
            "Created session {} for user {} at {}",
            session_id,
            user_id,
            workspace.display()
        );
        Ok(session_id)
    }

    /// Live session, or one persisted by an earlier process
    pub async fn get_session(&self, session_id: &str) -> SessionResult<Option<SessionState>> {
        if let Some(state) = self.sessions.read().await.get(session_id) {
            return Ok(Some(state.clone()));
        }
        Ok(self.store.load(session_id).await?)
    }

    pub async fn is_live(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn begin_task(&self, session_id: &str, task: &TaskContext) {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(state) => state.active_tasks.push(task.clone()),
            None => debug!(
                "Task {} started on session {} which is not live",
                task.task_id, session_id
            ),
        }
    }

    pub async fn finish_task(&self, session_id: &str, task_id: &str) {
        if let Some(state) = self.sessions.write().await.get_mut(session_id) {
            state.active_tasks.retain(|t| t.task_id != task_id);
        }
    }

    pub async fn active_tasks(&self, session_id: &str) -> Vec<TaskContext> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|state| state.active_tasks.clone())
            .unwrap_or_default()
    }

    /// Snapshot the session's workspace and persist it as a named checkpoint.
    /// `transparency_log` is the session's log at the time of the call.
    pub async fn create_checkpoint(
        &self,
        session_id: &str,
        checkpoint_name: &str,
        transparency_log: Vec<AgentAction>,
    ) -> SessionResult<String> {
        let source = self
            .get_session(session_id)
            .await?
            .filter(|state| !state.is_checkpoint())
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

        let capture = snapshot::capture(&self.workspace_path(session_id)).await?;
        if !capture.skipped.is_empty() {
            debug!(
                "Checkpoint of {} skipped {} entries",
                session_id,
                capture.skipped.len()
            );
        }

        let checkpoint_id = self.allocate_checkpoint_id(session_id).await?;
        let checkpoint = SessionState {
            session_id: checkpoint_id.clone(),
            user_id: source.user_id,
            workspace_snapshot: capture.snapshot,
            agent_memory: source.agent_memory,
            conversation_history: source.conversation_history,
            active_tasks: source.active_tasks,
            transparency_log,
            created_at: Utc::now(),
            checkpoint_name: Some(checkpoint_name.to_string()),
        };
        self.store.save(&checkpoint).await?;

        info!(
            "Created checkpoint {} ({:?}) of session {} with {} files",
            checkpoint_id,
            checkpoint_name,
            session_id,
            checkpoint.workspace_snapshot.files.len()
        );
        Ok(checkpoint_id)
    }

    /// Restore a checkpoint's files and memory into `target_session_id`.
    /// Unknown targets become new sessions owned by the checkpoint's user.
    pub async fn restore_checkpoint(
        &self,
        checkpoint_id: &str,
        target_session_id: &str,
    ) -> SessionResult<RestoreOutcome> {
        validate_id(target_session_id)?;
        let checkpoint = self
            .store
            .load(checkpoint_id)
            .await?
            .filter(SessionState::is_checkpoint)
            .ok_or_else(|| SessionError::CheckpointNotFound(checkpoint_id.to_string()))?;

        // Checkpoints are immutable; only sessions can receive a restore
        let existing = self.get_session(target_session_id).await?;
        if existing.as_ref().is_some_and(SessionState::is_checkpoint) {
            return Err(SessionError::CheckpointTarget(target_session_id.to_string()));
        }

        let workspace = self.workspace_path(target_session_id);
        tokio::fs::create_dir_all(&workspace).await?;
        let report = snapshot::restore(&checkpoint.workspace_snapshot, &workspace).await?;
        if !report.is_complete() {
            warn!(
                "Restore of {} into {} left {} files unrestored",
                checkpoint_id,
                target_session_id,
                report.failed.len()
            );
        }

        let adopted = existing.is_none();
        let mut target = existing
            .unwrap_or_else(|| SessionState::new(target_session_id, &checkpoint.user_id));
        target.agent_memory = checkpoint.agent_memory.clone();
        target.conversation_history = checkpoint.conversation_history.clone();
        target.transparency_log = checkpoint.transparency_log.clone();

        self.store.save(&target).await?;
        self.sessions
            .write()
            .await
            .insert(target_session_id.to_string(), target);

        info!(
            "Restored checkpoint {} into session {} ({} files restored, {} failed)",
            checkpoint_id,
            target_session_id,
            report.restored.len(),
            report.failed.len()
        );

        Ok(RestoreOutcome {
            target_session_id: target_session_id.to_string(),
            report,
            transparency_log: checkpoint.transparency_log,
            adopted,
        })
    }

    pub async fn list_checkpoints(&self, session_id: &str) -> SessionResult<Vec<CheckpointSummary>> {
        let known = self.get_session(session_id).await?;
        if !known.is_some_and(|state| !state.is_checkpoint()) {
            return Err(SessionError::SessionNotFound(session_id.to_string()));
        }
        Ok(self.store.list_checkpoints(session_id).await?)
    }

    /// `<session>_restore_<millis>`, suffixed when two land in the same millisecond
    async fn allocate_checkpoint_id(&self, session_id: &str) -> SessionResult<String> {
        let base = format!(
            "{}{}",
            checkpoint_id_prefix(session_id),
            Utc::now().timestamp_millis()
        );
        let mut candidate = base.clone();
        let mut attempt = 1;
        while self.store.load(&candidate).await?.is_some() {
            attempt += 1;
            candidate = format!("{}_{}", base, attempt);
        }
        Ok(candidate)
    }
}
