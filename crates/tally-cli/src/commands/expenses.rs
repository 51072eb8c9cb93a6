//! Expense command implementations

use anyhow::{bail, Context, Result};
use tally_core::db::Database;
use tally_core::{record_expense, Direction, ExpenseRecord, ExpenseStore, Interpreter};

use super::truncate;

/// Interpret `text` and store it for `owner`
pub async fn cmd_add(
    db: &Database,
    interpreter: &Interpreter,
    owner: &str,
    text: &str,
) -> Result<()> {
    let record = record_expense(db, interpreter, owner, text)
        .await
        .context("Failed to record expense")?;

    println!("✅ Recorded #{}", record.id);
    print_record(&record);
    Ok(())
}

/// Interpret `text` and print the result without storing it
pub async fn cmd_parse(interpreter: &Interpreter, text: &str) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        bail!("Please provide expense text");
    }

    let outcome = interpreter
        .parse_detailed(text)
        .await
        .context("Failed to interpret statement")?;

    for failure in &outcome.failures {
        println!("   ❌ {}: {}", failure.model, failure.error);
    }
    println!("   ✅ Answered by {}", outcome.model);
    println!();

    let draft = &outcome.draft;
    println!("   Type:     {}", draft.direction);
    println!("   Amount:   {:.2}", draft.amount);
    println!("   Category: {}", draft.category);
    if !draft.items.is_empty() {
        println!("   Items:    {}", draft.items.join(", "));
    }
    Ok(())
}

pub fn cmd_list(db: &Database, owner: &str, limit: usize) -> Result<()> {
    let records = db.list_recent(owner, limit)?;

    if records.is_empty() {
        println!("No records found. Add one with:");
        println!("  tally add \"200 dosa idly\"");
        return Ok(());
    }

    println!();
    println!("📝 Recent Records ({})", owner);
    println!("   ─────────────────────────────────────────────────────────────");

    for record in &records {
        print_record(record);
    }

    Ok(())
}

fn print_record(record: &ExpenseRecord) {
    let amount_str = match record.direction {
        Direction::Expense => format!("\x1b[31m{:.2}\x1b[0m", record.amount), // Red for expenses
        Direction::Income => format!("\x1b[32m+{:.2}\x1b[0m", record.amount), // Green for income
    };
    let when = record
        .timestamp
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M");

    println!(
        "   {} │ {:>12} │ {:<8} │ {}",
        when,
        amount_str,
        record.category.as_str(),
        truncate(&record.raw_text, 40)
    );
}
