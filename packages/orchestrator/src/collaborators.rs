// ABOUTME: Extension points for work the orchestrator sequences but does not perform
// ABOUTME: Component generation and autonomous agent delegation, with default implementations

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use unison_core::{AgentRole, ComponentCategory, TaskContext};

use crate::error::StrategyError;

/// Produces one generated artifact descriptor per component category.
/// The descriptor is opaque to the orchestrator.
#[async_trait]
pub trait ComponentGenerator: Send + Sync {
    async fn generate(
        &self,
        category: ComponentCategory,
        task: &TaskContext,
    ) -> Result<String, StrategyError>;
}

/// Placeholder generator describing what would be generated
pub struct TemplateGenerator;

#[async_trait]
impl ComponentGenerator for TemplateGenerator {
    async fn generate(
        &self,
        category: ComponentCategory,
        task: &TaskContext,
    ) -> Result<String, StrategyError> {
        Ok(format!("Generated {} for: {}", category, task.description))
    }
}

/// Hands autonomous-mode work to background agents
#[async_trait]
pub trait AgentDelegate: Send + Sync {
    async fn spawn(&self, _role: AgentRole, _task: &TaskContext) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Findings to attach to the research step, if any
    async fn research(&self, _task: &TaskContext) -> Result<Option<JsonValue>, StrategyError> {
        Ok(None)
    }
}

/// Delegate that only lets the steps be logged
pub struct NoopDelegate;

impl AgentDelegate for NoopDelegate {}
