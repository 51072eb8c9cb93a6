//! Natural-language statement interpreter
//!
//! Turns a free-form statement ("200 dosa idly", "income 500 saree sale") into
//! an [`ExpenseDraft`] by asking the models of a [`ModelChain`] in priority
//! order. A later model is consulted only when every earlier one failed, and
//! the chain is walked exactly once per call.

use std::collections::HashMap;
use std::future::Future;

use tracing::{debug, info, warn};

use crate::ai::parsing::parse_expense_draft;
use crate::ai::{AIBackend, AIClient, ChainInfo, ModelFailure, ParseOutcome};
use crate::error::{Error, Result};
use crate::model_chain::ModelChain;
use crate::models::ExpenseDraft;
use crate::prompts::{Prompt, PromptId, PromptLibrary};

/// First success from an ordered traversal
#[derive(Debug)]
pub struct Attempted<T> {
    pub model: String,
    pub value: T,
    pub failures: Vec<ModelFailure>,
}

/// Try `attempt` against each model in order, stopping at the first success
///
/// Returns every failure, oldest first, when no model succeeds. Attempts never
/// overlap: each one is awaited before the next model is considered.
pub async fn try_models_in_order<T, F, Fut>(
    models: &[String],
    mut attempt: F,
) -> std::result::Result<Attempted<T>, Vec<ModelFailure>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut failures = Vec::new();

    for model in models {
        match attempt(model.clone()).await {
            Ok(value) => {
                return Ok(Attempted {
                    model: model.clone(),
                    value,
                    failures,
                })
            }
            Err(e) => {
                warn!(model = %model, error = %e, "Model failed, trying next");
                failures.push(ModelFailure {
                    model: model.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    Err(failures)
}

/// Interpreter with its backend, chain and prompt fixed at construction
#[derive(Clone)]
pub struct Interpreter {
    client: AIClient,
    chain: ModelChain,
    prompt: Prompt,
}

impl Interpreter {
    pub fn new(client: AIClient, chain: ModelChain, prompt: Prompt) -> Self {
        Self {
            client,
            chain,
            prompt,
        }
    }

    /// Build from environment variables and config files
    ///
    /// Returns `Ok(None)` when the selected backend is missing required
    /// settings (e.g. `AI_BACKEND=ollama` without `OLLAMA_HOST`).
    pub fn from_env() -> Result<Option<Self>> {
        let Some(client) = AIClient::from_env() else {
            return Ok(None);
        };
        let chain = ModelChain::from_env(client.kind())?;
        if chain.is_empty() {
            warn!(backend = %client.kind(), "No models configured; every parse will fail");
        }
        let prompt = PromptLibrary::new().get(PromptId::ParseExpense)?;
        if prompt.is_override() {
            info!(path = ?prompt.override_path, "Using prompt override");
        }

        let client = client.with_timeout(chain.timeout());
        Ok(Some(Self::new(client, chain, prompt)))
    }

    /// Interpret `text`, failing with [`Error::Interpretation`] when no model
    /// produced a JSON object
    pub async fn parse(&self, text: &str) -> Result<ExpenseDraft> {
        self.parse_detailed(text).await.map(|outcome| outcome.draft)
    }

    /// Like [`parse`](Self::parse) but also reports which model answered
    pub async fn parse_detailed(&self, text: &str) -> Result<ParseOutcome> {
        let prompt = self.render_prompt(text);
        let prompt = prompt.as_str();

        let attempted = try_models_in_order(self.chain.models(), |model: String| async move {
            debug!(model = %model, "Trying model");
            let response = self.client.generate(&model, prompt).await?;
            debug!(model = %model, "Raw model output: {}", response);
            parse_expense_draft(&response)
        })
        .await;

        match attempted {
            Ok(attempted) => {
                info!(
                    model = %attempted.model,
                    skipped = attempted.failures.len(),
                    "Statement interpreted"
                );
                Ok(ParseOutcome {
                    draft: attempted.value,
                    model: attempted.model,
                    failures: attempted.failures,
                })
            }
            Err(failures) => {
                let last = failures
                    .last()
                    .map(|f| format!("{}: {}", f.model, f.error))
                    .unwrap_or_else(|| "no models configured".to_string());
                Err(Error::Interpretation(last))
            }
        }
    }

    /// The exact prompt sent to every model for `text`
    pub fn render_prompt(&self, text: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("text", text);
        self.prompt.render(&vars)
    }

    pub fn client(&self) -> &AIClient {
        &self.client
    }

    pub fn chain(&self) -> &ModelChain {
        &self.chain
    }

    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    pub fn info(&self) -> ChainInfo {
        ChainInfo {
            backend: self.client.kind(),
            host: self.client.host().to_string(),
            models: self.chain.models().to_vec(),
            timeout_secs: self.chain.timeout().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockBackend, MockReply};
    use crate::models::{Category, Direction};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn interpreter(backend: MockBackend, models: &[&str]) -> Interpreter {
        Interpreter::new(
            AIClient::Mock(backend),
            ModelChain::new(models.iter().copied(), Duration::from_secs(1)),
            Prompt::embedded(PromptId::ParseExpense).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_first_model_success() {
        let backend = MockBackend::new();
        let interp = interpreter(backend.clone(), &["a", "b"]);

        let draft = interp.parse("200 dosa idly").await.unwrap();
        assert_eq!(draft.amount, dec!(200));
        assert_eq!(draft.category, Category::Food);
        assert_eq!(backend.calls(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_fallback_stops_at_first_success() {
        let backend = MockBackend::new().failing("a").with_reply(
            "b",
            MockReply::Text(
                r#"{"type":"income","amount":500,"items":["saree sale"],"category":"Income"}"#
                    .into(),
            ),
        );
        let interp = interpreter(backend.clone(), &["a", "b", "c"]);

        let outcome = interp.parse_detailed("income 500 saree sale").await.unwrap();
        assert_eq!(outcome.model, "b");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].model, "a");
        assert_eq!(outcome.draft.direction, Direction::Income);
        assert_eq!(outcome.draft.items, vec!["saree sale"]);

        // c is never invoked
        assert_eq!(backend.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_malformed_json_falls_through() {
        let backend = MockBackend::new()
            .with_reply("a", MockReply::Text("Sorry, I can't help with that.".into()));
        let interp = interpreter(backend.clone(), &["a", "b"]);

        let outcome = interp.parse_detailed("50 tea").await.unwrap();
        assert_eq!(outcome.model, "b");
        assert_eq!(backend.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_all_models_fail_reports_last_error() {
        let backend = MockBackend::new()
            .with_reply("a", MockReply::Fail("quota exceeded".into()))
            .with_reply("b", MockReply::Fail("model not found".into()));
        let interp = interpreter(backend.clone(), &["a", "b"]);

        let err = interp.parse("200 dosa").await.unwrap_err();
        match err {
            Error::Interpretation(msg) => {
                assert!(msg.contains("model not found"), "got {}", msg);
                assert!(!msg.contains("quota"));
            }
            other => panic!("expected Interpretation, got {:?}", other),
        }
        assert_eq!(backend.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_chain_fails() {
        let interp = interpreter(MockBackend::new(), &[]);
        let err = interp.parse("200 dosa").await.unwrap_err();
        assert!(matches!(err, Error::Interpretation(_)));
    }

    #[tokio::test]
    async fn test_empty_object_gets_defaults() {
        let backend = MockBackend::new().with_reply("a", MockReply::Text("```json\n{}\n```".into()));
        let interp = interpreter(backend, &["a"]);

        let draft = interp.parse("something").await.unwrap();
        assert_eq!(draft.direction, Direction::Expense);
        assert_eq!(draft.amount, Decimal::ZERO);
        assert!(draft.items.is_empty());
        assert_eq!(draft.category, Category::Other);
    }

    #[tokio::test]
    async fn test_try_models_in_order_collects_failures() {
        let models = vec!["x".to_string(), "y".to_string()];
        let result: std::result::Result<Attempted<()>, _> =
            try_models_in_order(&models, |m: String| async move {
                Err(Error::InvalidData(format!("{} down", m)))
            })
            .await;

        let failures = result.unwrap_err();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[1].error, "Invalid data: y down");
    }

    #[test]
    fn test_info_reports_chain() {
        let interp = interpreter(MockBackend::new(), &["a", "b"]);
        let info = interp.info();
        assert_eq!(info.models, vec!["a", "b"]);
        assert_eq!(info.timeout_secs, 1);
        assert!(interp.render_prompt("tea 10").contains("Text: \"tea 10\""));
    }
}
