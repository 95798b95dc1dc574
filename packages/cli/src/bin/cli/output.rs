// ABOUTME: Terminal rendering of agent actions, task results and metrics
// ABOUTME: Shared by the run and restore commands

use colored::*;
use unison_core::{AgentAction, TaskResult};
use unison_orchestrator::MetricsSnapshot;

/// One line per action: time, role, action type, description
pub fn action_line(action: &AgentAction) -> String {
    let mut line = format!(
        "{} {:<18} {:<20} {}",
        action.timestamp.format("%H:%M:%S").to_string().dimmed(),
        action.agent_role.as_str().cyan(),
        action.action_type.bold(),
        action.description
    );
    if action.duration_ms > 0 {
        line.push_str(&format!(" {}", format!("({}ms)", action.duration_ms).dimmed()));
    }
    if let Some(error) = &action.error_message {
        line.push_str(&format!(" {}", error.red()));
    }
    line
}

pub fn print_action(action: &AgentAction) {
    println!("{}", action_line(action));
}

pub fn print_result(result: &TaskResult) -> anyhow::Result<()> {
    println!();
    if result.success {
        println!(
            "{} Task {} completed in {}ms",
            "✓".green().bold(),
            result.task_id,
            result.duration_ms
        );
    } else {
        println!(
            "{} Task {} failed after {}ms: {}",
            "✗".red().bold(),
            result.task_id,
            result.duration_ms,
            result.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    if let Some(output) = &result.result {
        println!("{}", serde_json::to_string_pretty(output)?);
    }
    Ok(())
}

pub fn print_metrics(metrics: &MetricsSnapshot) {
    println!();
    println!("{}", "Metrics".blue().bold());
    println!(
        "  tasks: {} ({} succeeded, {} failed)",
        metrics.total_tasks, metrics.successful_tasks, metrics.failed_tasks
    );
    println!("  success rate: {:.1}%", metrics.success_rate);
    println!("  average duration: {:.1}ms", metrics.avg_execution_time);
    println!("  active sessions: {}", metrics.active_sessions);
}
