// ABOUTME: Persisted session document shared by live sessions and checkpoints
// ABOUTME: The serialized field names are the restore-compatibility contract

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use unison_core::{AgentAction, TaskContext};

use crate::snapshot::WorkspaceSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub workspace_snapshot: WorkspaceSnapshot,
    #[serde(default)]
    pub agent_memory: Map<String, JsonValue>,
    #[serde(default)]
    pub conversation_history: Vec<JsonValue>,
    #[serde(default)]
    pub active_tasks: Vec<TaskContext>,
    #[serde(default)]
    pub transparency_log: Vec<AgentAction>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub checkpoint_name: Option<String>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            workspace_snapshot: WorkspaceSnapshot::empty(),
            agent_memory: Map::new(),
            conversation_history: Vec::new(),
            active_tasks: Vec::new(),
            transparency_log: Vec::new(),
            created_at: Utc::now(),
            checkpoint_name: None,
        }
    }

    pub fn is_checkpoint(&self) -> bool {
        self.checkpoint_name.is_some()
    }
}

/// Prefix shared by every checkpoint id derived from `session_id`
pub fn checkpoint_id_prefix(session_id: &str) -> String {
    format!("{}_restore_", session_id)
}

/// True when `id` was allocated as a checkpoint of `session_id` itself,
/// `<session>_restore_<millis>` with an optional `_<n>` collision suffix
pub fn is_checkpoint_id_of(id: &str, session_id: &str) -> bool {
    let Some(rest) = id.strip_prefix(&checkpoint_id_prefix(session_id)) else {
        return false;
    };
    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match rest.split_once('_') {
        None => is_number(rest),
        Some((millis, suffix)) => is_number(millis) && is_number(suffix),
    }
}

/// Listing entry for a stored checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub checkpoint_id: String,
    pub checkpoint_name: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl CheckpointSummary {
    /// Summary of `state` when it is a checkpoint
    pub fn from_state(state: &SessionState) -> Option<Self> {
        state.checkpoint_name.as_ref().map(|name| Self {
            checkpoint_id: state.session_id.clone(),
            checkpoint_name: name.clone(),
            user_id: state.user_id.clone(),
            created_at: state.created_at,
        })
    }
}
