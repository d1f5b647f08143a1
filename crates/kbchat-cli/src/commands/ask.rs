//! `kbchat ask` command implementation

use crate::context::CliContext;
use crate::output::print_json;
use colored::Colorize;
use futures::StreamExt;
use kbchat_foundation::service::new_session_id;
use kbchat_kernel::rag::{RankedMatch, StreamEvent};
use std::io::Write;

/// Execute the `kbchat ask` command
pub async fn run(
    ctx: &CliContext,
    question: &str,
    session: Option<&str>,
    top_k: Option<usize>,
    stream: bool,
) -> anyhow::Result<()> {
    if stream {
        let session_id = session.map(str::to_string).unwrap_or_else(new_session_id);
        if ctx.is_json() {
            return stream_events(ctx, &session_id, question, top_k).await;
        }
        stream_answer(ctx, &session_id, question, top_k).await?;
        println!("{}", format!("session: {session_id}").dimmed());
        return Ok(());
    }

    let reply = ctx.service.chat(session, question, top_k).await?;

    if ctx.is_json() {
        return print_json(&reply);
    }
    println!("{}", reply.response);
    println!();
    print_sources(&reply.context_used);
    println!("{}", format!("session: {}", reply.session_id).dimmed());
    Ok(())
}

/// Print the answer fragment by fragment and return the full text.
///
/// Shared with the interactive chat loop.
pub async fn stream_answer(
    ctx: &CliContext,
    session_id: &str,
    question: &str,
    top_k: Option<usize>,
) -> anyhow::Result<String> {
    let mut events = ctx.service.chat_stream(session_id, question, top_k);
    let mut stdout = std::io::stdout();
    let mut sources = Vec::new();
    let mut answer = String::new();

    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Context { context } => sources = context,
            StreamEvent::Content { content } => {
                print!("{content}");
                stdout.flush()?;
                answer.push_str(&content);
            }
            StreamEvent::Done => {
                println!();
                println!();
                print_sources(&sources);
                return Ok(answer);
            }
            StreamEvent::Error { message } => {
                if !answer.is_empty() {
                    println!();
                }
                anyhow::bail!("{message}");
            }
        }
    }

    anyhow::bail!("answer stream ended unexpectedly")
}

/// Print each event as one line of JSON. An `Error` event is printed and
/// then turned into a failing exit.
async fn stream_events(
    ctx: &CliContext,
    session_id: &str,
    question: &str,
    top_k: Option<usize>,
) -> anyhow::Result<()> {
    let mut events = ctx.service.chat_stream(session_id, question, top_k);
    let mut stdout = std::io::stdout();

    while let Some(event) = events.next().await {
        writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
        stdout.flush()?;
        match event {
            StreamEvent::Done => return Ok(()),
            StreamEvent::Error { message } => anyhow::bail!("{message}"),
            StreamEvent::Context { .. } | StreamEvent::Content { .. } => {}
        }
    }

    anyhow::bail!("answer stream ended unexpectedly")
}

pub fn print_sources(sources: &[RankedMatch]) {
    if sources.is_empty() {
        return;
    }
    println!("{}", "Sources:".bold());
    for source in sources {
        println!(
            "  • {} {}",
            source.title.cyan(),
            format!("({:.2})", source.score).dimmed()
        );
    }
}
