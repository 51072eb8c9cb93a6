//! Tally Core Library
//!
//! Shared functionality for the Tally expense ledger:
//! - Natural-language interpretation with an ordered model fallback chain
//! - Pluggable inference backends (Gemini, Ollama, OpenAI-compatible)
//! - Model chain configuration and the prompt library
//! - Day/month summaries with category breakdown
//! - Encrypted record storage

pub mod ai;
pub mod db;
pub mod error;
pub mod interpreter;
pub mod ledger;
pub mod model_chain;
pub mod models;
pub mod prompts;
pub mod summary;

/// Test utilities including the mock inference server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIBackend, AIClient, BackendKind, ChainInfo, GeminiBackend, MockBackend, MockReply,
    ModelFailure, OllamaBackend, OpenAICompatibleBackend, ParseOutcome,
};
pub use db::{Database, ExpenseStore};
pub use error::{Error, Result};
pub use interpreter::{try_models_in_order, Interpreter};
pub use ledger::{owner_summary, record_expense, record_expense_at};
pub use model_chain::{ChainConfig, ModelChain};
pub use models::{
    Category, CategoryTotals, Direction, ExpenseDraft, ExpenseRecord, NewExpense, Summary,
};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use summary::summarize;
