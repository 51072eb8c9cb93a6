//! Write and read paths tying the interpreter, store, and aggregator together

use chrono::{DateTime, TimeZone, Utc};
use tracing::info;

use crate::db::ExpenseStore;
use crate::error::{Error, Result};
use crate::interpreter::Interpreter;
use crate::models::{ExpenseRecord, NewExpense, Summary};
use crate::summary::summarize;

/// Interpret `text` and store the result for `owner_id`
///
/// Blank text is rejected before any model is called. Nothing is inserted
/// when interpretation fails.
pub async fn record_expense(
    store: &dyn ExpenseStore,
    interpreter: &Interpreter,
    owner_id: &str,
    text: &str,
) -> Result<ExpenseRecord> {
    record_expense_at(store, interpreter, owner_id, text, Utc::now()).await
}

/// [`record_expense`] with an explicit record timestamp
pub async fn record_expense_at(
    store: &dyn ExpenseStore,
    interpreter: &Interpreter,
    owner_id: &str,
    text: &str,
    timestamp: DateTime<Utc>,
) -> Result<ExpenseRecord> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidInput("Please provide expense text".into()));
    }
    if owner_id.trim().is_empty() {
        return Err(Error::InvalidInput("owner id is required".into()));
    }

    let draft = interpreter.parse(text).await?;
    let expense = NewExpense::from_draft(owner_id, text, draft, timestamp)?;
    let record = store.insert_expense(&expense)?;

    info!(
        id = record.id,
        direction = %record.direction,
        category = %record.category,
        "Recorded expense"
    );
    Ok(record)
}

/// Summary of every record of `owner_id` as of `as_of`
pub fn owner_summary<Tz: TimeZone>(
    store: &dyn ExpenseStore,
    owner_id: &str,
    as_of: &DateTime<Tz>,
) -> Result<Summary> {
    let records = store.find_all_by_owner(owner_id)?;
    Ok(summarize(&records, as_of))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIClient, MockBackend, MockReply};
    use crate::db::Database;
    use crate::model_chain::ModelChain;
    use crate::models::{Category, Direction};
    use crate::prompts::{Prompt, PromptId};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn interpreter(backend: MockBackend) -> Interpreter {
        Interpreter::new(
            AIClient::Mock(backend),
            ModelChain::new(["primary", "fallback"], Duration::from_secs(1)),
            Prompt::embedded(PromptId::ParseExpense).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_record_expense_trims_and_stores() {
        let db = Database::in_memory().unwrap();
        let interp = interpreter(MockBackend::new());

        let record = record_expense(&db, &interp, "u1", "  income 500 saree sale  ")
            .await
            .unwrap();
        assert_eq!(record.raw_text, "income 500 saree sale");
        assert_eq!(record.direction, Direction::Income);
        assert_eq!(record.category, Category::Income);
        assert_eq!(db.count_expenses(Some("u1")).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_blank_text_never_reaches_models() {
        let db = Database::in_memory().unwrap();
        let backend = MockBackend::new();
        let interp = interpreter(backend.clone());

        let err = record_expense(&db, &interp, "u1", "   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(backend.calls().is_empty());
        assert_eq!(db.count_expenses(None).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_interpretation_failure_inserts_nothing() {
        let db = Database::in_memory().unwrap();
        let backend = MockBackend::new().failing("primary").failing("fallback");
        let interp = interpreter(backend);

        let err = record_expense(&db, &interp, "u1", "200 dosa").await.unwrap_err();
        assert!(matches!(err, Error::Interpretation(_)));
        assert_eq!(db.count_expenses(None).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_owner_summary_after_writes() {
        let db = Database::in_memory().unwrap();
        let backend = MockBackend::new().with_reply(
            "primary",
            MockReply::Text(r#"{"type":"expense","amount":99.99,"category":"Food"}"#.into()),
        );
        let interp = interpreter(backend);

        record_expense(&db, &interp, "u1", "lunch").await.unwrap();
        record_expense(&db, &interp, "u1", "dinner").await.unwrap();

        let summary = owner_summary(&db, "u1", &Utc::now()).unwrap();
        assert_eq!(summary.today_total, dec!(199.98));
        assert_eq!(summary.today_count, 2);
        assert_eq!(summary.category_breakdown[&Category::Food].expense, dec!(199.98));

        let empty = owner_summary(&db, "someone-else", &Utc::now()).unwrap();
        assert_eq!(empty, Summary::default());
    }

    #[tokio::test]
    async fn test_oversized_model_amount_keeps_summary_usable() {
        let db = Database::in_memory().unwrap();
        let backend = MockBackend::new().with_reply(
            "primary",
            MockReply::Text(r#"{"amount":"50000000000000000000000000000","category":"Bills"}"#.into()),
        );
        let interp = interpreter(backend);

        for _ in 0..2 {
            let record = record_expense(&db, &interp, "u1", "rent").await.unwrap();
            assert_eq!(record.amount, rust_decimal::Decimal::ZERO);
        }

        let summary = owner_summary(&db, "u1", &Utc::now()).unwrap();
        assert_eq!(summary.today_count, 2);
        assert_eq!(summary.today_total, rust_decimal::Decimal::ZERO);
    }
}
