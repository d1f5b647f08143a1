//! `kbchat sessions` command implementation

use crate::context::CliContext;
use crate::output::print_json;
use colored::Colorize;
use kbchat_kernel::rag::Session;

fn format_time(session_time: &chrono::DateTime<chrono::Utc>) -> String {
    session_time
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn print_session(session: &Session) {
    println!("  {}", session.id.cyan());
    println!(
        "    {} created {}, last active {}",
        "·".dimmed(),
        format_time(&session.created_at),
        format_time(&session.last_activity)
    );
}

/// List sessions, most recently active first
pub async fn list(ctx: &CliContext) -> anyhow::Result<()> {
    let sessions = ctx.service.list_sessions().await?;

    if ctx.is_json() {
        return print_json(&sessions);
    }

    println!("{} Sessions", "→".green());
    println!();
    if sessions.is_empty() {
        println!("  No sessions found.");
        return Ok(());
    }
    for session in &sessions {
        print_session(session);
    }
    println!();
    println!("  Total: {} session(s)", sessions.len());
    Ok(())
}

/// Start a new, empty session
pub async fn create(ctx: &CliContext) -> anyhow::Result<()> {
    let session = ctx.service.create_session().await?;

    if ctx.is_json() {
        return print_json(&session);
    }
    println!("{} Session created: {}", "✓".green(), session.id.cyan());
    Ok(())
}

/// Show one session and how many exchanges it holds
pub async fn show(ctx: &CliContext, id: &str) -> anyhow::Result<()> {
    let Some(session) = ctx.service.get_session(id).await? else {
        anyhow::bail!("Session '{}' not found", id);
    };

    if ctx.is_json() {
        return print_json(&session);
    }

    let exchanges = ctx.service.history(id, usize::MAX).await?.len();
    println!("{} Session", "→".green());
    print_session(&session);
    println!("    {} {} exchange(s)", "·".dimmed(), exchanges);
    Ok(())
}
