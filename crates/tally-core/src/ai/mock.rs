//! Mock backend for testing
//!
//! Answers with a keyword-based interpretation of the statement embedded in
//! the prompt, or with a scripted reply per model. Useful for unit tests and
//! development without network access.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};

use super::types::BackendKind;
use super::AIBackend;

/// Scripted answer for one model
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text verbatim
    Text(String),
    /// Fail with this message
    Fail(String),
}

/// Mock AI backend for testing
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    replies: Arc<HashMap<String, MockReply>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Default::default()
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self::default()
    }

    /// Script the reply for `model`
    pub fn with_reply(mut self, model: &str, reply: MockReply) -> Self {
        Arc::make_mut(&mut self.replies).insert(model.to_string(), reply);
        self
    }

    /// Shorthand for a model that always fails
    pub fn failing(self, model: &str) -> Self {
        let message = format!("{} is unavailable", model);
        self.with_reply(model, MockReply::Fail(message))
    }

    /// Models invoked so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(model.to_string());
        }

        match self.replies.get(model) {
            Some(MockReply::Text(text)) => Ok(text.clone()),
            Some(MockReply::Fail(message)) => Err(Error::InvalidData(message.clone())),
            None => Ok(interpret_text(statement_from_prompt(prompt))),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Mock
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

/// The quoted statement at the end of a rendered parse prompt
pub(crate) fn statement_from_prompt(prompt: &str) -> &str {
    const MARKER: &str = "Text: \"";
    match prompt.rfind(MARKER) {
        Some(idx) => {
            let rest = &prompt[idx + MARKER.len()..];
            rest.rfind('"').map(|end| &rest[..end]).unwrap_or(rest)
        }
        None => prompt,
    }
}

const INCOME_WORDS: &[&str] = &[
    "income", "salary", "received", "got", "sold", "sale", "refund", "earned",
];
const FOOD_WORDS: &[&str] = &[
    "dosa", "idly", "idli", "tea", "coffee", "lunch", "dinner", "breakfast", "biryani", "food",
    "snacks", "vegetables", "milk", "groceries",
];
const TRAVEL_WORDS: &[&str] = &[
    "bus", "auto", "taxi", "uber", "ola", "petrol", "diesel", "fuel", "train", "metro", "flight",
    "ticket",
];
const BILL_WORDS: &[&str] = &[
    "rent", "electricity", "bill", "recharge", "internet", "wifi", "water", "gas",
];
const SHOPPING_WORDS: &[&str] = &["shirt", "shoes", "clothes", "amazon", "flipkart", "shopping"];
const FILLER_WORDS: &[&str] = &["spent", "paid", "for", "on", "rs", "rs.", "rupees", "inr", "₹"];

/// Keyword interpretation returning the JSON a well-behaved model would
pub(crate) fn interpret_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();
    let has_any = |set: &[&str]| words.iter().any(|w| set.contains(w));

    let amount = words
        .iter()
        .find_map(|w| w.trim_start_matches('₹').parse::<f64>().ok())
        .unwrap_or(0.0);

    let is_income = has_any(INCOME_WORDS);
    let category = if is_income {
        "Income"
    } else if has_any(FOOD_WORDS) {
        "Food"
    } else if has_any(TRAVEL_WORDS) {
        "Travel"
    } else if has_any(BILL_WORDS) {
        "Bills"
    } else if has_any(SHOPPING_WORDS) {
        "Shopping"
    } else {
        "Other"
    };

    let remaining: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| w.trim_start_matches('₹').parse::<f64>().is_err())
        .filter(|w| !FILLER_WORDS.contains(w) && *w != "income")
        .collect();
    let items: Vec<String> = if is_income {
        if remaining.is_empty() {
            Vec::new()
        } else {
            vec![remaining.join(" ")]
        }
    } else {
        remaining.iter().map(|w| w.to_string()).collect()
    };

    json!({
        "type": if is_income { "income" } else { "expense" },
        "amount": amount,
        "items": items,
        "category": category,
    })
    .to_string()
}
