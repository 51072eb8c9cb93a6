//! Expense handlers: record a statement, list recent records, summarize

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use tally_core::{owner_summary, record_expense, ExpenseRecord, ExpenseStore, Summary};

use crate::{get_user_email, AppError, AppState, MAX_PAGE_LIMIT};

#[derive(Debug, Deserialize)]
pub struct AddExpenseRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Serialize)]
pub struct AddExpenseResponse {
    pub message: &'static str,
    pub expense: ExpenseRecord,
}

/// Interpret a free-text statement and store it for the caller
pub async fn add_expense(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AddExpenseRequest>,
) -> Result<(StatusCode, Json<AddExpenseResponse>), AppError> {
    let text = request.text.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AppError::bad_request("Please provide expense text"));
    }

    let Some(interpreter) = state.interpreter.as_ref() else {
        return Err(AppError::service_unavailable("AI backend not configured"));
    };

    let owner = get_user_email(&headers);
    let expense = record_expense(&state.db, interpreter, &owner, &text).await?;

    Ok((
        StatusCode::CREATED,
        Json(AddExpenseResponse {
            message: "Expense added successfully",
            expense,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListExpensesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    MAX_PAGE_LIMIT
}

#[derive(Serialize)]
pub struct ListExpensesResponse {
    pub expenses: Vec<ExpenseRecord>,
}

/// Most recent records of the caller, newest first
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListExpensesQuery>,
    headers: HeaderMap,
) -> Result<Json<ListExpensesResponse>, AppError> {
    let owner = get_user_email(&headers);
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);

    let expenses = state.db.list_recent(&owner, limit)?;
    Ok(Json(ListExpensesResponse { expenses }))
}

/// Today/month totals and category breakdown as of the server's local now
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Summary>, AppError> {
    let owner = get_user_email(&headers);
    let summary = owner_summary(&state.db, &owner, &chrono::Local::now())?;
    Ok(Json(summary))
}
