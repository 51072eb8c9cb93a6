//! Tally CLI - Natural-language expense ledger
//!
//! Usage:
//!   tally init                   Initialize database
//!   tally add "200 dosa idly"    Interpret and record a statement
//!   tally summary                Today's and this month's totals
//!   tally serve --port 3000      Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Add { text, owner } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let interpreter = commands::load_interpreter()?;
            commands::cmd_add(&db, &interpreter, &owner, &text).await
        }
        Commands::Parse { text } => {
            let interpreter = commands::load_interpreter()?;
            commands::cmd_parse(&interpreter, &text).await
        }
        Commands::List { owner, limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_list(&db, &owner, limit)
        }
        Commands::Summary { owner } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_summary(&db, &owner)
        }
        Commands::Models => commands::cmd_models().await,
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                no_auth,
                cli.no_encrypt,
                static_dir.as_deref(),
            )
            .await
        }
    }
}
