//! Pluggable inference backend abstraction
//!
//! Tally delegates all language understanding to an external model. This
//! module hides which service answers behind a single `generate(model, prompt)`
//! operation so the interpreter can walk its model chain without caring about
//! the wire protocol.
//!
//! # Architecture
//!
//! - `AIBackend` trait: the interface every backend implements
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `GeminiBackend`, `OllamaBackend`,
//!   `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (gemini, ollama, openai_compatible, mock). Default: gemini
//! - `GEMINI_API_KEY`: API key for the Gemini backend (missing key is only a warning)
//! - `GEMINI_BASE_URL`: Override the Gemini endpoint (default: Google's public API)
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

mod gemini;
mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use gemini::GeminiBackend;
pub use mock::{MockBackend, MockReply};
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

pub(crate) use mock::{interpret_text, statement_from_prompt};

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Trait defining the interface for all inference backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Send a fully rendered prompt to `model` and return the raw text answer
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Which backend this is (selects the default model chain)
    fn kind(&self) -> BackendKind;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Build an HTTP client with a request timeout
pub(crate) fn http_client(timeout: Option<Duration>) -> reqwest::Client {
    let builder = reqwest::Client::builder();
    let builder = match timeout {
        Some(t) => builder.timeout(t),
        None => builder,
    };
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to build HTTP client, using defaults");
        reqwest::Client::new()
    })
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// Google Gemini (generativelanguage API)
    Gemini(GeminiBackend),
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// OpenAI-compatible backend (vLLM, LocalAI, llama-server, OpenAI itself, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Checks `AI_BACKEND` to determine which backend to use:
    /// - `gemini` (default): Uses GEMINI_API_KEY and GEMINI_BASE_URL
    /// - `ollama`: Uses OLLAMA_HOST
    /// - `openai_compatible`: Uses OPENAI_COMPATIBLE_HOST and OPENAI_COMPATIBLE_API_KEY
    /// - `mock`: Creates a mock backend for testing
    ///
    /// Returns None if the selected backend's required variables are not set.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "gemini".to_string());

        match backend.parse::<BackendKind>() {
            Ok(BackendKind::Gemini) => Some(AIClient::Gemini(GeminiBackend::from_env())),
            Ok(BackendKind::Ollama) => OllamaBackend::from_env().map(AIClient::Ollama),
            Ok(BackendKind::OpenAICompatible) => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            Ok(BackendKind::Mock) => Some(AIClient::Mock(MockBackend::new())),
            Err(_) => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to gemini");
                Some(AIClient::Gemini(GeminiBackend::from_env()))
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Same backend with a request timeout applied to every call
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match self {
            AIClient::Gemini(b) => AIClient::Gemini(b.with_timeout(timeout)),
            AIClient::Ollama(b) => AIClient::Ollama(b.with_timeout(timeout)),
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_timeout(timeout)),
            AIClient::Mock(b) => AIClient::Mock(b.clone()),
        }
    }

    /// Environment variable the backend needs but did not get, if any
    pub fn missing_credential(&self) -> Option<&'static str> {
        match self {
            AIClient::Gemini(b) if !b.has_api_key() => Some("GEMINI_API_KEY"),
            _ => None,
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        match self {
            AIClient::Gemini(b) => b.generate(model, prompt).await,
            AIClient::Ollama(b) => b.generate(model, prompt).await,
            AIClient::OpenAICompatible(b) => b.generate(model, prompt).await,
            AIClient::Mock(b) => b.generate(model, prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Gemini(b) => b.health_check().await,
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn kind(&self) -> BackendKind {
        match self {
            AIClient::Gemini(b) => b.kind(),
            AIClient::Ollama(b) => b.kind(),
            AIClient::OpenAICompatible(b) => b.kind(),
            AIClient::Mock(b) => b.kind(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.host(),
            AIClient::Ollama(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
