use clap::Parser;
use owo_colors::OwoColorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use commands::*;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise -v raises the library level. Library events use
    // `delve.<subsystem>` targets, which the `delve` directive covers.
    let default_filter = match cli.verbose {
        0 => "delve=warn,delve_cli=info",
        1 => "delve=debug,delve_cli=debug",
        _ => "delve=trace,delve_cli=trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match &cli.command {
        Commands::Search {
            query,
            backend,
            limit,
            include_domains,
            exclude_domains,
        } => {
            search::run(
                &cli,
                query,
                backend.as_deref(),
                *limit,
                include_domains,
                exclude_domains,
            )
            .await
        }
        Commands::Multi {
            query,
            backends,
            limit,
        } => multi::run(&cli, query, backends, *limit).await,
        Commands::Classify { query } => classify::run(&cli, query).await,
        Commands::Status => status::run(&cli),
        Commands::Rules => rules::run(&cli),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        if let Some(hint) = e.hint() {
            eprintln!("{} {}", "Hint:".dimmed(), hint);
        }
        process::exit(1);
    }
}
