//! Report command implementations

use anyhow::Result;
use tally_core::db::Database;
use tally_core::{owner_summary, Summary};

pub fn cmd_summary(db: &Database, owner: &str) -> Result<()> {
    let summary = owner_summary(db, owner, &chrono::Local::now())?;
    print_summary(owner, &summary);
    Ok(())
}

fn print_summary(owner: &str, summary: &Summary) {
    println!();
    println!("📊 Summary ({})", owner);
    println!("   ─────────────────────────────");
    println!(
        "   Today:      {:>10.2}  ({} records)",
        summary.today_total, summary.today_count
    );
    println!(
        "   This month: {:>10.2}  ({} records)",
        summary.period_total, summary.period_count
    );

    if summary.category_breakdown.is_empty() {
        println!();
        println!("   No records yet.");
        return;
    }

    println!();
    println!("   By category (all time)");
    for (category, totals) in &summary.category_breakdown {
        let mut parts = Vec::new();
        if !totals.expense.is_zero() {
            parts.push(format!("spent {:.2}", totals.expense));
        }
        if !totals.income.is_zero() {
            parts.push(format!("received {:.2}", totals.income));
        }
        if parts.is_empty() {
            parts.push("0.00".to_string());
        }
        println!("   {:<10} {}", category.to_string(), parts.join(", "));
    }
}
