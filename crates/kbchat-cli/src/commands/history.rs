//! `kbchat history` command implementation

use crate::context::CliContext;
use crate::output::print_json;
use colored::Colorize;

/// Execute the `kbchat history` command
pub async fn run(ctx: &CliContext, session: &str, limit: usize) -> anyhow::Result<()> {
    let records = ctx.service.history(session, limit).await?;

    if ctx.is_json() {
        return print_json(&records);
    }

    println!("{} Session {}", "→".green(), session.cyan());
    println!();
    if records.is_empty() {
        println!("  No messages found.");
        return Ok(());
    }

    for record in &records {
        let when = record
            .created_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S");
        println!("{} {}", format!("[{when}]").dimmed(), "you".bold());
        println!("  {}", record.user_message);
        println!("{}", "assistant".bold());
        println!("  {}", record.bot_response.replace('\n', "\n  "));
        if !record.context_used.is_empty() {
            let titles: Vec<&str> = record.context_used.iter().map(|m| m.title.as_str()).collect();
            println!("  {}", format!("sources: {}", titles.join(", ")).dimmed());
        }
        println!();
    }
    Ok(())
}
