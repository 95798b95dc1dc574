// ABOUTME: Core data model shared by the transparency, sandbox, session and orchestrator crates
// ABOUTME: Agent roles, transparency actions, task contexts, execution modes and results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::utils::{generate_action_id, generate_task_id};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unknown agent role: {0}")]
    UnknownRole(String),
    #[error("Unknown execution mode: {0}")]
    UnknownMode(String),
    #[error("Unknown sandbox strategy: {0}")]
    UnknownStrategy(String),
}

/// Role a unit of work is attributed to in the transparency log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    #[serde(rename = "planning_agent")]
    Planning,
    #[serde(rename = "coding_agent")]
    Coding,
    #[serde(rename = "testing_agent")]
    Testing,
    #[serde(rename = "deployment_agent")]
    Deployment,
    #[serde(rename = "research_agent")]
    Research,
    #[serde(rename = "ui_agent")]
    UiGeneration,
    #[serde(rename = "backend_agent")]
    Backend,
    #[serde(rename = "orchestrator_agent")]
    Orchestrator,
}

impl AgentRole {
    pub const ALL: [AgentRole; 8] = [
        AgentRole::Planning,
        AgentRole::Coding,
        AgentRole::Testing,
        AgentRole::Deployment,
        AgentRole::Research,
        AgentRole::UiGeneration,
        AgentRole::Backend,
        AgentRole::Orchestrator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning_agent",
            Self::Coding => "coding_agent",
            Self::Testing => "testing_agent",
            Self::Deployment => "deployment_agent",
            Self::Research => "research_agent",
            Self::UiGeneration => "ui_agent",
            Self::Backend => "backend_agent",
            Self::Orchestrator => "orchestrator_agent",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = ParseError;

    /// Accepts both the wire name ("ui_agent") and the short name ("ui")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let short = normalized.strip_suffix("_agent").unwrap_or(&normalized);
        match short {
            "planning" => Ok(Self::Planning),
            "coding" => Ok(Self::Coding),
            "testing" => Ok(Self::Testing),
            "deployment" => Ok(Self::Deployment),
            "research" => Ok(Self::Research),
            "ui" | "ui_generation" => Ok(Self::UiGeneration),
            "backend" => Ok(Self::Backend),
            "orchestrator" => Ok(Self::Orchestrator),
            _ => Err(ParseError::UnknownRole(s.to_string())),
        }
    }
}

/// Routing tag selecting the task-handling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Perceive, plan, act in the sandbox, reflect
    Isolated,
    /// Delegated multi-agent background work
    Autonomous,
    /// Multi-component generation
    Generative,
    /// Isolated, then autonomous, then generative
    Hybrid,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Isolated => "isolated",
            Self::Autonomous => "autonomous",
            Self::Generative => "generative",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "isolated" => Ok(Self::Isolated),
            "autonomous" => Ok(Self::Autonomous),
            "generative" => Ok(Self::Generative),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(ParseError::UnknownMode(s.to_string())),
        }
    }
}

/// Task lifecycle: Pending -> Running -> {Completed, Failed}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Component categories sequenced by the generative strategy, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentCategory {
    Frontend,
    Backend,
    Database,
    Authentication,
    Deployment,
}

impl ComponentCategory {
    pub const ALL: [ComponentCategory; 5] = [
        ComponentCategory::Frontend,
        ComponentCategory::Backend,
        ComponentCategory::Database,
        ComponentCategory::Authentication,
        ComponentCategory::Deployment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Database => "database",
            Self::Authentication => "authentication",
            Self::Deployment => "deployment",
        }
    }

    /// Role credited with generating this category
    pub fn role(&self) -> AgentRole {
        match self {
            Self::Frontend => AgentRole::UiGeneration,
            _ => AgentRole::Backend,
        }
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of work recorded in a session's transparency log.
///
/// Actions are built with the `with_*` helpers and then handed to the log by
/// value; once appended they are never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub id: String,
    pub agent_role: AgentRole,
    pub action_type: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_data: Option<JsonValue>,
    #[serde(default)]
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AgentAction {
    pub fn new(
        agent_role: AgentRole,
        action_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_action_id(),
            agent_role,
            action_type: action_type.into(),
            description: description.into(),
            timestamp: Utc::now(),
            input_data: None,
            output_data: None,
            duration_ms: 0,
            success: true,
            error_message: None,
        }
    }

    pub fn with_input(mut self, input: JsonValue) -> Self {
        self.input_data = Some(input);
        self
    }

    pub fn with_output(mut self, output: JsonValue) -> Self {
        self.output_data = Some(output);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    /// Mark the action as failed with a human-readable reason
    pub fn failed(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error_message.into());
        self
    }
}

fn default_priority() -> i32 {
    1
}

/// Caller-supplied description of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    pub task_id: String,
    pub user_id: String,
    pub description: String,
    pub execution_mode: ExecutionMode,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub assigned_roles: Vec<AgentRole>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_config: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl TaskContext {
    pub fn new(
        user_id: impl Into<String>,
        description: impl Into<String>,
        execution_mode: ExecutionMode,
    ) -> Self {
        Self {
            task_id: generate_task_id(),
            user_id: user_id.into(),
            description: description.into(),
            execution_mode,
            priority: default_priority(),
            assigned_roles: Vec::new(),
            dependencies: Vec::new(),
            workspace_path: None,
            git_repo: None,
            environment_config: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = AgentRole>) -> Self {
        self.assigned_roles = roles.into_iter().collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_workspace(mut self, path: impl Into<PathBuf>) -> Self {
        self.workspace_path = Some(path.into());
        self
    }

    pub fn with_environment(mut self, config: JsonValue) -> Self {
        self.environment_config = Some(config);
        self
    }

    /// Look up a string entry in `environment_config`
    pub fn env_str(&self, key: &str) -> Option<&str> {
        self.environment_config
            .as_ref()
            .and_then(|config| config.get(key))
            .and_then(|value| value.as_str())
    }

    /// Look up an unsigned integer entry in `environment_config`
    pub fn env_u64(&self, key: &str) -> Option<u64> {
        self.environment_config
            .as_ref()
            .and_then(|config| config.get(key))
            .and_then(|value| value.as_u64())
    }
}

/// Why a sandboxed command did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionFailure {
    /// Wall-clock bound expired and the process/container was force-killed
    Timeout,
    /// The executor could not launch the command at all
    LaunchFailure,
    /// The command ran and exited with a non-zero code
    NonZeroExit,
}

/// Outcome of one sandboxed command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExecutionFailure>,
}

/// Result payload of the isolated strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolatedOutput {
    pub command: String,
    pub workspace_path: PathBuf,
    pub execution_result: ExecutionResult,
}

/// Result payload of the autonomous strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutonomousOutput {
    pub agents_spawned: Vec<AgentRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research: Option<JsonValue>,
}

/// One generated component descriptor, opaque to the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedComponent {
    pub category: ComponentCategory,
    pub artifact: String,
}

/// Result payload of the generative strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerativeOutput {
    pub generated_components: Vec<GeneratedComponent>,
    pub deployment_ready: bool,
}

/// Result payload of the hybrid strategy: all three sub-results together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridOutput {
    pub isolated: IsolatedOutput,
    pub autonomous: AutonomousOutput,
    pub generative: GenerativeOutput,
}

/// Strategy-specific result payload, tagged by approach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "approach", rename_all = "snake_case")]
pub enum TaskOutput {
    Isolated(IsolatedOutput),
    Autonomous(AutonomousOutput),
    Generative(GenerativeOutput),
    Hybrid(HybridOutput),
}

/// Produced exactly once per submitted task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

impl TaskResult {
    pub fn succeeded(task_id: impl Into<String>, result: TaskOutput, duration_ms: u64) -> Self {
        Self {
            task_id: task_id.into(),
            success: true,
            result: Some(result),
            error_message: None,
            duration_ms,
        }
    }

    pub fn failed(
        task_id: impl Into<String>,
        error_message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            result: None,
            error_message: Some(error_message.into()),
            duration_ms,
        }
    }
}
