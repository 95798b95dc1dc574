// ABOUTME: Top-level orchestration of Unison agent tasks
// ABOUTME: Routes tasks by execution mode, logs every step, and manages checkpoints and metrics

pub mod collaborators;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
mod strategy;

pub use collaborators::{AgentDelegate, ComponentGenerator, NoopDelegate, TemplateGenerator};
pub use config::{ConfigError, OrchestratorConfig, StoreKind};
pub use error::{OrchestratorError, Result, StrategyError};
pub use metrics::MetricsSnapshot;
pub use orchestrator::Orchestrator;
