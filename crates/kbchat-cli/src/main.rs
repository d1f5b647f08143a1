//! kbchat - chat with a knowledge base from the command line

mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use context::CliContext;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose; logs go to stderr so JSON output stays clean
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_command(cli))
}

async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let ctx = CliContext::new(
        cli.config.as_deref(),
        cli.store.as_deref(),
        cli.output,
        cli.command.needs_backend(),
    )
    .await?;

    match cli.command {
        Commands::Add {
            title,
            content,
            file,
            category,
            url,
        } => {
            commands::document::add(&ctx, title, content, file.as_deref(), category, url).await?;
        }

        Commands::Update {
            id,
            title,
            content,
            category,
        } => {
            commands::document::update(&ctx, &id, title, content, category).await?;
        }

        Commands::Remove { id } => {
            commands::document::remove(&ctx, &id).await?;
        }

        Commands::List => {
            commands::document::list(&ctx).await?;
        }

        Commands::Show { id } => {
            commands::document::show(&ctx, &id).await?;
        }

        Commands::Search { query, top_k } => {
            commands::search::run(&ctx, &query, top_k).await?;
        }

        Commands::Ask {
            question,
            session,
            top_k,
            stream,
        } => {
            commands::ask::run(&ctx, &question, session.as_deref(), top_k, stream).await?;
        }

        Commands::Chat { session, top_k } => {
            commands::chat::run(&ctx, session, top_k).await?;
        }

        Commands::Sessions { action } => match action {
            cli::SessionCommands::List => commands::session::list(&ctx).await?,
            cli::SessionCommands::New => commands::session::create(&ctx).await?,
            cli::SessionCommands::Show { id } => commands::session::show(&ctx, &id).await?,
        },

        Commands::Doctor => {
            commands::doctor::run(&ctx).await?;
        }

        Commands::History { session, limit } => {
            commands::history::run(&ctx, &session, limit).await?;
        }
    }

    Ok(())
}
