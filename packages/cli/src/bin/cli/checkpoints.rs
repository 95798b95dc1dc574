// ABOUTME: `unison restore` and `unison checkpoints` commands
// ABOUTME: Work against checkpoints persisted by earlier runs

use anyhow::Result;
use colored::*;
use unison_orchestrator::Orchestrator;

use super::output::print_action;

pub async fn restore(
    orchestrator: &Orchestrator,
    checkpoint_id: &str,
    into: Option<String>,
    user: &str,
) -> Result<()> {
    let target = match into {
        Some(session_id) => session_id,
        None => orchestrator.create_session(user).await?,
    };

    let complete = orchestrator.restore_session(checkpoint_id, &target).await?;
    if complete {
        println!(
            "{} {} into session {}",
            "Restored".green().bold(),
            checkpoint_id,
            target
        );
    } else {
        println!(
            "{} {} into session {} (some files could not be restored, see log)",
            "Partially restored".yellow().bold(),
            checkpoint_id,
            target
        );
    }
    println!(
        "{}",
        format!(
            "Workspace: {}",
            orchestrator.session_workspace(&target).display()
        )
        .dimmed()
    );

    let actions = orchestrator.get_transparency_log(&target, None).await?;
    if actions.is_empty() {
        println!("{}", "The checkpoint carries no transparency log".dimmed());
        return Ok(());
    }

    println!();
    println!("{}", "Transparency log".blue().bold());
    for action in &actions {
        print_action(action);
    }
    Ok(())
}

pub async fn list(orchestrator: &Orchestrator, session_id: &str) -> Result<()> {
    let checkpoints = orchestrator.list_checkpoints(session_id).await?;

    if checkpoints.is_empty() {
        println!("{}", "No checkpoints found".yellow());
        println!(
            "{}",
            "Use 'unison run --checkpoint <name>' to create one".dimmed()
        );
        return Ok(());
    }

    println!("{} {}", "Checkpoints of".blue().bold(), session_id);
    println!();
    for checkpoint in checkpoints {
        println!(
            "  {}  {}  {}",
            checkpoint.checkpoint_id.bold(),
            checkpoint.checkpoint_name,
            checkpoint
                .created_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed()
        );
    }
    Ok(())
}
