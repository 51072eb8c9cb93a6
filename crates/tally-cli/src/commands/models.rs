//! Interpreter configuration command

use anyhow::Result;
use tally_core::{AIBackend, ChainConfig};

use super::load_interpreter;

/// Show the backend, model chain, prompt source and backend health
pub async fn cmd_models() -> Result<()> {
    println!("🔍 Interpreter configuration\n");

    let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "gemini (default)".to_string());
    println!("  AI_BACKEND: {}", backend);

    match ChainConfig::load()?.source() {
        Some(path) => println!("  Model config: {}", path.display()),
        None => println!("  Model config: built-in defaults"),
    }
    if let Ok(models) = std::env::var("TALLY_MODELS") {
        println!("  TALLY_MODELS override: {}", models);
    }

    let interpreter = match load_interpreter() {
        Ok(interpreter) => interpreter,
        Err(e) => {
            println!("\n⚠️  {}", e);
            return Ok(());
        }
    };

    let info = interpreter.info();
    println!("  Backend: {} at {}", info.backend, info.host);
    println!("  Timeout: {}s per model", info.timeout_secs);
    if let Some(var) = interpreter.client().missing_credential() {
        println!("  ⚠️  {} is not set; every model call will fail", var);
    }
    println!("\n  Model chain (tried in order):");
    if info.models.is_empty() {
        println!("    (none configured)");
    }
    for (i, model) in info.models.iter().enumerate() {
        println!("    {}. {}", i + 1, model);
    }

    let prompt = interpreter.prompt();
    match &prompt.override_path {
        Some(path) => println!(
            "\n  Prompt: {} v{} (override: {})",
            prompt.metadata.id,
            prompt.metadata.version,
            path.display()
        ),
        None => println!(
            "\n  Prompt: {} v{} (built-in)",
            prompt.metadata.id, prompt.metadata.version
        ),
    }

    print!("\nChecking backend availability... ");
    if interpreter.client().health_check().await {
        println!("✅ Connected");
    } else {
        println!("❌ Failed");
        println!("\n⚠️  Could not reach {}", info.host);
    }

    Ok(())
}
