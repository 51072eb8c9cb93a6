//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Owner used when none is given; matches the server's unauthenticated identity
pub const DEFAULT_OWNER: &str = "local-dev";

/// Tally - Record expenses by describing them
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Self-hosted natural-language expense ledger", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Describe an expense or income in plain words and record it
    ///
    /// Example: tally add "200 dosa idly"
    Add {
        /// The statement to interpret
        text: String,

        /// Owner to record under
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
    },

    /// Interpret a statement without storing it
    Parse {
        /// The statement to interpret
        text: String,
    },

    /// List recent records, newest first
    List {
        /// Owner whose records to list
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,

        /// Maximum number of records
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show today's and this month's totals with a category breakdown
    Summary {
        /// Owner to summarize
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
    },

    /// Show the AI backend, model chain and prompt in use
    Models,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires Cloudflare Access authentication headers
        /// or a bearer key from TALLY_API_KEYS.
        #[arg(long)]
        no_auth: bool,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}
