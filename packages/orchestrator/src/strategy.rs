// ABOUTME: One handler per execution mode, plus the hybrid composition
// ABOUTME: Handlers log each step to the session's transparency log as they go

use serde_json::json;
use std::path::PathBuf;
use tracing::debug;
use unison_core::{
    AgentAction, AgentRole, AutonomousOutput, ComponentCategory, ExecutionMode, GeneratedComponent,
    GenerativeOutput, HybridOutput, IsolatedOutput, TaskContext, TaskOutput,
};
use unison_sandbox::SandboxedExecutor;
use unison_transparency::TransparencyLog;

use crate::collaborators::{AgentDelegate, ComponentGenerator};
use crate::error::StrategyError;

/// Everything a handler may touch while running one task
pub(crate) struct StrategyContext<'a> {
    pub log: &'a TransparencyLog,
    pub executor: &'a SandboxedExecutor,
    pub generator: &'a dyn ComponentGenerator,
    pub delegate: &'a dyn AgentDelegate,
    pub workspace: PathBuf,
    pub default_timeout_secs: u64,
}

pub(crate) async fn run(
    ctx: &StrategyContext<'_>,
    task: &TaskContext,
) -> Result<TaskOutput, StrategyError> {
    match task.execution_mode {
        ExecutionMode::Isolated => run_isolated(ctx, task).await.map(TaskOutput::Isolated),
        ExecutionMode::Autonomous => run_autonomous(ctx, task).await.map(TaskOutput::Autonomous),
        ExecutionMode::Generative => run_generative(ctx, task).await.map(TaskOutput::Generative),
        ExecutionMode::Hybrid => run_hybrid(ctx, task).await.map(TaskOutput::Hybrid),
    }
}

/// Perceive, plan, execute in the sandbox, reflect
async fn run_isolated(
    ctx: &StrategyContext<'_>,
    task: &TaskContext,
) -> Result<IsolatedOutput, StrategyError> {
    ctx.log
        .append(
            AgentAction::new(
                AgentRole::Planning,
                "perceive",
                format!("Analyzing task: {}", task.description),
            )
            .with_input(json!({
                "description": task.description,
                "workspace": ctx.workspace,
            })),
        )
        .await;

    let command = task
        .env_str("command")
        .map(str::to_string)
        .unwrap_or_else(|| format!("echo {}", shell_quote(&format!("Executing: {}", task.description))));
    let timeout_seconds = task
        .env_u64("timeout_seconds")
        .unwrap_or(ctx.default_timeout_secs);

    ctx.log
        .append(
            AgentAction::new(AgentRole::Planning, "plan", "Planning execution steps").with_output(
                json!({
                    "command": command,
                    "timeout_seconds": timeout_seconds,
                }),
            ),
        )
        .await;

    tokio::fs::create_dir_all(&ctx.workspace)
        .await
        .map_err(|e| StrategyError::Workspace(format!("{}: {}", ctx.workspace.display(), e)))?;

    let result = ctx
        .executor
        .execute(&command, Some(&ctx.workspace), timeout_seconds)
        .await;
    debug!(
        "Task {} command finished: success={}, exit_code={}",
        task.task_id, result.success, result.exit_code
    );

    let mut execute = AgentAction::new(
        AgentRole::Coding,
        "execute",
        format!("Executing: {}", command),
    )
    .with_input(json!({ "command": command }))
    .with_output(json!({
        "execution_id": result.execution_id,
        "exit_code": result.exit_code,
        "stdout": result.stdout,
        "stderr": result.stderr,
    }))
    .with_duration_ms(result.duration_ms);
    if !result.success {
        execute = execute.failed(format!(
            "Command exited with {}: {}",
            result.exit_code,
            result.stderr.trim()
        ));
    }
    ctx.log.append(execute).await;

    let verdict = if result.success {
        "Execution succeeded"
    } else {
        "Execution failed, results need review"
    };
    ctx.log
        .append(
            AgentAction::new(AgentRole::Testing, "reflect", verdict).with_output(json!({
                "success": result.success,
                "exit_code": result.exit_code,
            })),
        )
        .await;

    Ok(IsolatedOutput {
        command,
        workspace_path: ctx.workspace.clone(),
        execution_result: result,
    })
}

/// Spawn one agent per assigned role, then research
async fn run_autonomous(
    ctx: &StrategyContext<'_>,
    task: &TaskContext,
) -> Result<AutonomousOutput, StrategyError> {
    let mut agents_spawned = Vec::with_capacity(task.assigned_roles.len());

    for role in &task.assigned_roles {
        ctx.delegate.spawn(*role, task).await?;
        ctx.log
            .append(
                AgentAction::new(
                    *role,
                    "spawn",
                    format!("Spawning {} for autonomous execution", role),
                )
                .with_input(json!({ "task_id": task.task_id })),
            )
            .await;
        agents_spawned.push(*role);
    }

    let research = ctx.delegate.research(task).await?;
    let mut action = AgentAction::new(
        AgentRole::Research,
        "research",
        format!("Conducting research for: {}", task.description),
    );
    if let Some(findings) = &research {
        action = action.with_output(findings.clone());
    }
    ctx.log.append(action).await;

    Ok(AutonomousOutput {
        agents_spawned,
        research,
    })
}

/// Architecture, one component per category, then deployment prep
async fn run_generative(
    ctx: &StrategyContext<'_>,
    task: &TaskContext,
) -> Result<GenerativeOutput, StrategyError> {
    ctx.log
        .append(
            AgentAction::new(
                AgentRole::Planning,
                "architecture_design",
                "Designing application architecture",
            )
            .with_input(json!({ "description": task.description })),
        )
        .await;

    let mut generated_components = Vec::with_capacity(ComponentCategory::ALL.len());
    for category in ComponentCategory::ALL {
        let description = format!("Generating {} component", category);
        match ctx.generator.generate(category, task).await {
            Ok(artifact) => {
                ctx.log
                    .append(
                        AgentAction::new(category.role(), "generate_component", description)
                            .with_output(json!({
                                "category": category,
                                "artifact": artifact,
                            })),
                    )
                    .await;
                generated_components.push(GeneratedComponent { category, artifact });
            }
            Err(e) => {
                ctx.log
                    .append(
                        AgentAction::new(category.role(), "generate_component", description)
                            .failed(e.to_string()),
                    )
                    .await;
                return Err(e);
            }
        }
    }

    ctx.log
        .append(AgentAction::new(
            AgentRole::Deployment,
            "prepare_deployment",
            "Preparing deployment configuration",
        ))
        .await;

    Ok(GenerativeOutput {
        generated_components,
        deployment_ready: true,
    })
}

/// Isolated, autonomous, generative in that order, then synthesis
async fn run_hybrid(
    ctx: &StrategyContext<'_>,
    task: &TaskContext,
) -> Result<HybridOutput, StrategyError> {
    let isolated = run_isolated(ctx, task).await?;
    let autonomous = run_autonomous(ctx, task).await?;
    let generative = run_generative(ctx, task).await?;

    ctx.log
        .append(AgentAction::new(
            AgentRole::Orchestrator,
            "hybrid_synthesis",
            "Synthesizing results from all approaches",
        ))
        .await;

    Ok(HybridOutput {
        isolated,
        autonomous,
        generative,
    })
}

/// Single-quote `s` for POSIX sh
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::Arc;
    use tempfile::TempDir;
    use unison_sandbox::LocalProcessProvider;

    use crate::collaborators::{NoopDelegate, TemplateGenerator};

    struct FailingOn(ComponentCategory);

    #[async_trait]
    impl ComponentGenerator for FailingOn {
        async fn generate(
            &self,
            category: ComponentCategory,
            _task: &TaskContext,
        ) -> Result<String, StrategyError> {
            if category == self.0 {
                Err(StrategyError::Generation {
                    category,
                    message: "boom".to_string(),
                })
            } else {
                Ok("ok".to_string())
            }
        }
    }

    fn executor(root: &TempDir) -> SandboxedExecutor {
        SandboxedExecutor::with_provider(root.path(), Arc::new(LocalProcessProvider::new()))
    }

    async fn action_types(log: &TransparencyLog) -> Vec<String> {
        log.query(None, None)
            .await
            .into_iter()
            .map(|a| a.action_type)
            .collect()
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("list files"), "'list files'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[cfg(unix)]
    #[rstest]
    #[case::isolated(ExecutionMode::Isolated, "isolated", "reflect")]
    #[case::autonomous(ExecutionMode::Autonomous, "autonomous", "research")]
    #[case::generative(ExecutionMode::Generative, "generative", "prepare_deployment")]
    #[case::hybrid(ExecutionMode::Hybrid, "hybrid", "hybrid_synthesis")]
    #[tokio::test]
    async fn test_run_dispatches_on_mode(
        #[case] mode: ExecutionMode,
        #[case] approach: &str,
        #[case] last_action: &str,
    ) {
        let root = TempDir::new().unwrap();
        let log = TransparencyLog::new("s");
        let executor = executor(&root);
        let ctx = StrategyContext {
            log: &log,
            executor: &executor,
            generator: &TemplateGenerator,
            delegate: &NoopDelegate,
            workspace: root.path().to_path_buf(),
            default_timeout_secs: 10,
        };
        let task = TaskContext::new("u", "dispatch", mode).with_roles([AgentRole::Coding]);

        let output = run(&ctx, &task).await.unwrap();

        let tagged = serde_json::to_value(&output).unwrap();
        assert_eq!(tagged["approach"], approach);
        let types = action_types(&log).await;
        assert_eq!(types.last().map(String::as_str), Some(last_action));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_isolated_runs_configured_command() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), "hello").unwrap();
        let log = TransparencyLog::new("s");
        let executor = executor(&root);
        let ctx = StrategyContext {
            log: &log,
            executor: &executor,
            generator: &TemplateGenerator,
            delegate: &NoopDelegate,
            workspace: root.path().to_path_buf(),
            default_timeout_secs: 10,
        };
        let task = TaskContext::new("u", "read file", ExecutionMode::Isolated)
            .with_environment(json!({ "command": "cat a.txt" }));

        let output = run_isolated(&ctx, &task).await.unwrap();

        assert_eq!(output.command, "cat a.txt");
        assert_eq!(output.execution_result.stdout, "hello");
        assert_eq!(
            action_types(&log).await,
            vec!["perceive", "plan", "execute", "reflect"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_isolated_failure_is_logged_but_not_an_error() {
        let root = TempDir::new().unwrap();
        let log = TransparencyLog::new("s");
        let executor = executor(&root);
        let ctx = StrategyContext {
            log: &log,
            executor: &executor,
            generator: &TemplateGenerator,
            delegate: &NoopDelegate,
            workspace: root.path().to_path_buf(),
            default_timeout_secs: 10,
        };
        let task = TaskContext::new("u", "fail", ExecutionMode::Isolated)
            .with_environment(json!({ "command": "exit 9" }));

        let output = run_isolated(&ctx, &task).await.unwrap();
        assert_eq!(output.execution_result.exit_code, 9);

        let execute = log
            .query(Some(AgentRole::Coding), None)
            .await
            .pop()
            .unwrap();
        assert!(!execute.success);
        assert!(execute.error_message.unwrap().contains("exited with 9"));
    }

    #[tokio::test]
    async fn test_autonomous_spawns_each_role_then_researches() {
        let root = TempDir::new().unwrap();
        let log = TransparencyLog::new("s");
        let executor = executor(&root);
        let ctx = StrategyContext {
            log: &log,
            executor: &executor,
            generator: &TemplateGenerator,
            delegate: &NoopDelegate,
            workspace: root.path().to_path_buf(),
            default_timeout_secs: 10,
        };
        let task = TaskContext::new("u", "survey", ExecutionMode::Autonomous)
            .with_roles([AgentRole::Planning, AgentRole::Coding]);

        let output = run_autonomous(&ctx, &task).await.unwrap();

        assert_eq!(
            output.agents_spawned,
            vec![AgentRole::Planning, AgentRole::Coding]
        );
        assert_eq!(action_types(&log).await, vec!["spawn", "spawn", "research"]);
        let research = log.query(Some(AgentRole::Research), None).await;
        assert_eq!(research.len(), 1);
    }

    #[tokio::test]
    async fn test_generative_covers_every_category() {
        let root = TempDir::new().unwrap();
        let log = TransparencyLog::new("s");
        let executor = executor(&root);
        let ctx = StrategyContext {
            log: &log,
            executor: &executor,
            generator: &TemplateGenerator,
            delegate: &NoopDelegate,
            workspace: root.path().to_path_buf(),
            default_timeout_secs: 10,
        };
        let task = TaskContext::new("u", "todo app", ExecutionMode::Generative);

        let output = run_generative(&ctx, &task).await.unwrap();

        let categories: Vec<ComponentCategory> = output
            .generated_components
            .iter()
            .map(|c| c.category)
            .collect();
        assert_eq!(categories, ComponentCategory::ALL.to_vec());
        assert_eq!(
            output.generated_components[1].artifact,
            "Generated backend for: todo app"
        );
        assert!(output.deployment_ready);

        let types = action_types(&log).await;
        assert_eq!(types.first().map(String::as_str), Some("architecture_design"));
        assert_eq!(types.last().map(String::as_str), Some("prepare_deployment"));
        assert_eq!(
            types.iter().filter(|t| *t == "generate_component").count(),
            5
        );

        let ui = log.query(Some(AgentRole::UiGeneration), None).await;
        assert_eq!(ui.len(), 1);
    }

    #[tokio::test]
    async fn test_generative_stops_at_failing_component() {
        let root = TempDir::new().unwrap();
        let log = TransparencyLog::new("s");
        let executor = executor(&root);
        let generator = FailingOn(ComponentCategory::Database);
        let ctx = StrategyContext {
            log: &log,
            executor: &executor,
            generator: &generator,
            delegate: &NoopDelegate,
            workspace: root.path().to_path_buf(),
            default_timeout_secs: 10,
        };
        let task = TaskContext::new("u", "todo app", ExecutionMode::Generative);

        let err = run_generative(&ctx, &task).await.unwrap_err();
        assert!(matches!(
            err,
            StrategyError::Generation {
                category: ComponentCategory::Database,
                ..
            }
        ));

        let actions = log.query(None, None).await;
        let last = actions.last().unwrap();
        assert_eq!(last.action_type, "generate_component");
        assert!(!last.success);
        assert!(!actions.iter().any(|a| a.action_type == "prepare_deployment"));
    }
}
