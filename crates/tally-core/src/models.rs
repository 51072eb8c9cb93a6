//! Domain models for Tally

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Money direction of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money spent (outflow)
    #[default]
    Expense,
    /// Money received (inflow)
    Income,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }

    /// Sign applied when netting windowed totals
    pub fn sign(&self) -> Decimal {
        match self {
            Self::Expense => Decimal::ONE,
            Self::Income => Decimal::NEGATIVE_ONE,
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed set of record categories
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum Category {
    Food,
    Travel,
    Shopping,
    Bills,
    Income,
    #[default]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Travel => "Travel",
            Self::Shopping => "Shopping",
            Self::Bills => "Bills",
            Self::Income => "Income",
            Self::Other => "Other",
        }
    }

    /// All categories, in display order
    pub fn all() -> &'static [Category] {
        &[
            Self::Food,
            Self::Travel,
            Self::Shopping,
            Self::Bills,
            Self::Income,
            Self::Other,
        ]
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized interpretation of one statement, before it is owned or stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub direction: Direction,
    pub amount: Decimal,
    pub items: Vec<String>,
    pub category: Category,
}

impl Default for ExpenseDraft {
    fn default() -> Self {
        Self {
            direction: Direction::Expense,
            amount: Decimal::ZERO,
            items: Vec::new(),
            category: Category::Other,
        }
    }
}

/// A record ready to be inserted
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub owner_id: String,
    pub direction: Direction,
    pub amount: Decimal,
    pub items: Vec<String>,
    pub category: Category,
    pub raw_text: String,
    pub timestamp: DateTime<Utc>,
}

impl NewExpense {
    /// Attach ownership, source text and time to a draft
    ///
    /// Rejects an empty owner, blank text, or a negative amount.
    pub fn from_draft(
        owner_id: &str,
        raw_text: &str,
        draft: ExpenseDraft,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        if owner_id.trim().is_empty() {
            return Err(Error::InvalidInput("owner id is required".into()));
        }
        if raw_text.trim().is_empty() {
            return Err(Error::InvalidInput("expense text is empty".into()));
        }
        if draft.amount.is_sign_negative() && !draft.amount.is_zero() {
            return Err(Error::InvalidData(format!(
                "amount must be non-negative, got {}",
                draft.amount
            )));
        }

        Ok(Self {
            owner_id: owner_id.to_string(),
            direction: draft.direction,
            amount: draft.amount,
            items: draft.items,
            category: draft.category,
            raw_text: raw_text.to_string(),
            timestamp,
        })
    }
}

/// A stored expense or income record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: i64,
    pub owner_id: String,
    pub direction: Direction,
    pub amount: Decimal,
    pub items: Vec<String>,
    pub category: Category,
    pub raw_text: String,
    pub timestamp: DateTime<Utc>,
}

impl ExpenseRecord {
    /// Amount with the netting sign applied (+ expense, - income)
    pub fn signed_amount(&self) -> Decimal {
        self.amount * self.direction.sign()
    }
}

/// Expense and income accumulated for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub expense: Decimal,
    pub income: Decimal,
}

/// Day and month totals plus an all-time category breakdown
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    /// Net magnitude of today's records
    pub today_total: Decimal,
    /// Net magnitude of this month's records
    pub period_total: Decimal,
    /// Per-category totals over the whole history
    pub category_breakdown: BTreeMap<Category, CategoryTotals>,
    pub today_count: usize,
    pub period_count: usize,
}
