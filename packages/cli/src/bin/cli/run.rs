// ABOUTME: `unison run` executes one task in a fresh session
// ABOUTME: Streams the session's transparency log while the task runs

use anyhow::Result;
use clap::Args;
use colored::*;
use serde_json::{json, Map, Value};
use tracing::debug;
use unison_core::{AgentRole, ExecutionMode, TaskContext};
use unison_orchestrator::Orchestrator;

use super::output::{print_action, print_metrics, print_result};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Task description
    pub description: String,

    /// Execution mode (isolated, autonomous, generative, hybrid)
    #[arg(short, long, default_value = "isolated", value_parser = parse_mode)]
    pub mode: ExecutionMode,

    /// Agent role to assign (repeatable)
    #[arg(short, long = "role", value_parser = parse_role)]
    pub roles: Vec<AgentRole>,

    /// Shell command for the isolated act phase
    #[arg(long)]
    pub command: Option<String>,

    /// Sandbox timeout in seconds for this task
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Create a checkpoint with this name after the task finishes
    #[arg(long)]
    pub checkpoint: Option<String>,

    /// Session owner
    #[arg(long, default_value = "local")]
    pub user: String,
}

fn parse_mode(s: &str) -> Result<ExecutionMode, String> {
    s.parse().map_err(|e: unison_core::ParseError| e.to_string())
}

fn parse_role(s: &str) -> Result<AgentRole, String> {
    s.parse().map_err(|e: unison_core::ParseError| e.to_string())
}

impl RunArgs {
    fn environment(&self) -> Option<Value> {
        let mut env = Map::new();
        if let Some(command) = &self.command {
            env.insert("command".to_string(), json!(command));
        }
        if let Some(timeout) = self.timeout {
            env.insert("timeout_seconds".to_string(), json!(timeout));
        }
        (!env.is_empty()).then_some(Value::Object(env))
    }

    fn task(&self) -> TaskContext {
        let mut task = TaskContext::new(&self.user, &self.description, self.mode)
            .with_roles(self.roles.iter().copied());
        if let Some(env) = self.environment() {
            task = task.with_environment(env);
        }
        task
    }
}

pub async fn run_task(orchestrator: &Orchestrator, args: RunArgs) -> Result<()> {
    let session_id = orchestrator.create_session(&args.user).await?;
    println!(
        "{} {} ({} sandbox)",
        "Session".blue().bold(),
        session_id,
        orchestrator.sandbox_provider()
    );
    println!(
        "{}",
        format!(
            "Workspace: {}",
            orchestrator.session_workspace(&session_id).display()
        )
        .dimmed()
    );
    println!();

    let mut actions = orchestrator
        .subscribe_transparency_channel(&session_id)
        .await?;
    let task = args.task();
    debug!("Submitting task {} as {}", task.task_id, task.execution_mode);

    let execution = orchestrator.execute_task(&session_id, task);
    tokio::pin!(execution);
    let result = loop {
        tokio::select! {
            biased;
            Some(action) = actions.recv() => print_action(&action),
            result = &mut execution => break result?,
        }
    };
    while let Ok(action) = actions.try_recv() {
        print_action(&action);
    }

    print_result(&result)?;

    if let Some(name) = &args.checkpoint {
        let checkpoint_id = orchestrator.create_checkpoint(&session_id, name).await?;
        println!();
        println!(
            "{} {} ({})",
            "Checkpoint".green().bold(),
            checkpoint_id,
            name
        );
    }

    print_metrics(&orchestrator.get_metrics().await);
    Ok(())
}
