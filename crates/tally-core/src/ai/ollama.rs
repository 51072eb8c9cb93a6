//! Ollama backend implementation
//!
//! HTTP client for a local or LAN Ollama server. The model is chosen per call
//! by the interpreter's chain, so one backend serves every model on the host.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::types::BackendKind;
use super::{http_client, AIBackend};

/// Ollama backend
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: http_client(None),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        Some(Self::new(&host))
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            http_client: http_client(Some(timeout)),
            base_url: self.base_url.clone(),
        }
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let request = OllamaRequest {
            model,
            prompt,
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::InvalidData(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        debug!(model = %model, "Ollama response: {}", ollama_response.response);

        Ok(ollama_response.response)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
