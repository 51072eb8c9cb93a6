//! AI backend types
//!
//! These types are backend-agnostic and used across all AI implementations.

use serde::{Deserialize, Serialize};

use crate::models::ExpenseDraft;

/// Which inference service a client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Gemini,
    Ollama,
    #[serde(rename = "openai_compatible")]
    OpenAICompatible,
    Mock,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::OpenAICompatible => "openai_compatible",
            Self::Mock => "mock",
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            "openai_compatible" | "openai-compatible" | "openai" => Ok(Self::OpenAICompatible),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown AI backend: {}", s)),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One model that was tried and did not produce a usable answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelFailure {
    pub model: String,
    pub error: String,
}

/// Successful interpretation along with how it was obtained
#[derive(Debug, Clone, Serialize)]
pub struct ParseOutcome {
    pub draft: ExpenseDraft,
    /// The model whose answer was accepted
    pub model: String,
    /// Models tried before it, in order
    pub failures: Vec<ModelFailure>,
}

/// Backend and model chain information for display
#[derive(Debug, Clone, Serialize)]
pub struct ChainInfo {
    pub backend: BackendKind,
    pub host: String,
    pub models: Vec<String>,
    pub timeout_secs: u64,
}
