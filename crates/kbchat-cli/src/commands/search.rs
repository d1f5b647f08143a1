//! `kbchat search` command implementation

use crate::context::CliContext;
use crate::output::{excerpt, print_json};
use colored::Colorize;

/// Execute the `kbchat search` command
pub async fn run(ctx: &CliContext, query: &str, top_k: Option<usize>) -> anyhow::Result<()> {
    let results = ctx.service.search(query, top_k).await?;

    if ctx.is_json() {
        return print_json(&results);
    }

    println!("{} Searching for: {}", "→".green(), query.cyan());
    println!();
    if results.is_empty() {
        println!("  No matching documents.");
        return Ok(());
    }

    for (rank, hit) in results.iter().enumerate() {
        println!(
            "  {}. {} {} {}",
            rank + 1,
            hit.title.bold(),
            format!("[{}]", hit.category).yellow(),
            format!("{:.3}", hit.score).dimmed()
        );
        println!("     {}", excerpt(&hit.content, 70));
        println!("     {}", hit.document_id.dimmed());
    }
    Ok(())
}
