//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_interpreter` - Build the interpreter from the environment
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tally_core::db::Database;
use tally_core::{ExpenseStore, Interpreter};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow!("Database path must be valid UTF-8: {}", db_path.display()))?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Interpreter for the backend selected by AI_BACKEND
pub fn load_interpreter() -> Result<Interpreter> {
    Interpreter::from_env()
        .context("Failed to load interpreter configuration")?
        .ok_or_else(|| {
            anyhow!(
                "AI backend not configured. Set AI_BACKEND (gemini, ollama, openai_compatible, mock) \
                 and its credentials (GEMINI_API_KEY, OLLAMA_HOST or OPENAI_COMPATIBLE_HOST)"
            )
        })
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    let existing = db.count_expenses(None).context("Failed to read expenses")?;
    println!("   Records: {}", existing);

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Record an expense: tally add \"200 dosa idly\"");
    println!("  2. Start web UI: tally serve");

    Ok(())
}
