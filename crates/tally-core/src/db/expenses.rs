//! Expense record operations

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};
use rust_decimal::Decimal;

use super::Database;
use crate::error::Result;
use crate::models::{ExpenseRecord, NewExpense};

/// Record query/insert capability
///
/// The interpreter and aggregator never touch storage directly; the write path
/// and summary path go through this trait.
pub trait ExpenseStore: Send + Sync {
    /// Insert one record and return it with its assigned id
    fn insert_expense(&self, expense: &NewExpense) -> Result<ExpenseRecord>;

    /// Every record of `owner_id`, oldest first
    fn find_all_by_owner(&self, owner_id: &str) -> Result<Vec<ExpenseRecord>>;

    /// The `limit` most recent records of `owner_id`, newest first
    fn list_recent(&self, owner_id: &str, limit: usize) -> Result<Vec<ExpenseRecord>>;

    /// Number of stored records, optionally for one owner
    fn count_expenses(&self, owner_id: Option<&str>) -> Result<i64>;
}

const SELECT_COLUMNS: &str =
    "SELECT id, owner_id, direction, amount, items, category, raw_text, timestamp FROM expenses";

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn row_to_expense(row: &Row) -> rusqlite::Result<ExpenseRecord> {
    let direction: String = row.get(2)?;
    let amount: String = row.get(3)?;
    let items: String = row.get(4)?;
    let category: String = row.get(5)?;
    let timestamp: String = row.get(7)?;

    Ok(ExpenseRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        direction: direction.parse().map_err(|e| conversion_error(2, e))?,
        amount: Decimal::from_str(&amount).map_err(|e| conversion_error(3, e))?,
        items: serde_json::from_str(&items).map_err(|e| conversion_error(4, e))?,
        category: category.parse().map_err(|e| conversion_error(5, e))?,
        raw_text: row.get(6)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(7, e))?,
    })
}

impl ExpenseStore for Database {
    fn insert_expense(&self, expense: &NewExpense) -> Result<ExpenseRecord> {
        let conn = self.conn()?;

        // Stored with microsecond precision; return exactly what a read gives back
        let timestamp = expense.timestamp.trunc_subsecs(6);
        let items = serde_json::to_string(&expense.items)?;

        conn.execute(
            r#"
            INSERT INTO expenses (owner_id, direction, amount, items, category, raw_text, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                expense.owner_id,
                expense.direction.as_str(),
                expense.amount.to_string(),
                items,
                expense.category.as_str(),
                expense.raw_text,
                format_timestamp(&timestamp),
            ],
        )?;

        Ok(ExpenseRecord {
            id: conn.last_insert_rowid(),
            owner_id: expense.owner_id.clone(),
            direction: expense.direction,
            amount: expense.amount,
            items: expense.items.clone(),
            category: expense.category,
            raw_text: expense.raw_text.clone(),
            timestamp,
        })
    }

    fn find_all_by_owner(&self, owner_id: &str) -> Result<Vec<ExpenseRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE owner_id = ? ORDER BY timestamp ASC, id ASC",
            SELECT_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![owner_id], row_to_expense)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn list_recent(&self, owner_id: &str, limit: usize) -> Result<Vec<ExpenseRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE owner_id = ? ORDER BY timestamp DESC, id DESC LIMIT ?",
            SELECT_COLUMNS
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![owner_id, limit], row_to_expense)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn count_expenses(&self, owner_id: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;
        let count = match owner_id {
            Some(owner) => conn.query_row(
                "SELECT COUNT(*) FROM expenses WHERE owner_id = ?",
                params![owner],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM expenses", [], |row| row.get(0))?,
        };
        Ok(count)
    }
}
