use anyhow::{Context as _, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use shopsync::cli::args::{Cli, Commands};
use shopsync::cli::commands;
use shopsync::cli::context::Context;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "shopsync=debug" } else { "shopsync=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        println!("{}", commands::completions(shell)?);
        return Ok(());
    }

    let ctx = Context::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let format = ctx.output_format(cli.output);

    let output = match cli.command {
        Commands::Status { check } => commands::status(&ctx, check, format).await?,
        Commands::List { failed, limit } => commands::list(&ctx, failed, limit, format).await?,
        Commands::Enqueue {
            kind,
            action,
            data,
            priority,
        } => commands::enqueue(&ctx, kind, action, &data, priority, format)
            .await
            .with_context(|| format!("Failed to queue {action} {kind}"))?,
        Commands::Remove { id } => commands::remove(&ctx, id, format).await?,
        Commands::Run => commands::run(&ctx, format).await?,
        Commands::Retry => commands::retry(&ctx, format).await?,
        Commands::ClearFailed => commands::clear_failed(&ctx, format).await?,
        Commands::Daemon { interval } => commands::daemon(&ctx, interval)
            .await
            .context("Sync daemon failed")?,
        Commands::Completions { .. } => String::new(),
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
