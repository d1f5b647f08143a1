//! `kbchat chat` command implementation

use super::ask::stream_answer;
use crate::context::CliContext;
use colored::Colorize;
use kbchat_foundation::service::new_session_id;
use std::io::{BufRead, Write};

/// Execute the `kbchat chat` command
///
/// Reads questions from stdin until `exit`, `quit` or end of input.
pub async fn run(ctx: &CliContext, session: Option<String>, top_k: Option<usize>) -> anyhow::Result<()> {
    let session_id = session
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(new_session_id);
    let generator = ctx.service.orchestrator().generator();

    println!("{} Chatting with your knowledge base", "→".green());
    println!("  Session: {}", session_id.cyan());
    match generator.backend() {
        Some(backend) => println!("  Model:   {}", backend.model().cyan()),
        None => println!(
            "  Mode:    {} (set OPENAI_API_KEY for AI answers)",
            generator.mode().as_str().yellow()
        ),
    }
    println!("  Type {} to leave.", "exit".bold());
    println!();

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("{} ", "you>".green().bold());
        std::io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        print!("{} ", "bot>".blue().bold());
        std::io::stdout().flush()?;
        if let Err(e) = stream_answer(ctx, &session_id, question, top_k).await {
            eprintln!("{} {}", "error:".red().bold(), e);
        }
    }

    println!("{}", format!("session: {session_id}").dimmed());
    Ok(())
}
