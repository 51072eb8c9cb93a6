//! Test utilities for tally-core
//!
//! Provides a mock inference server that speaks the Gemini, Ollama and
//! OpenAI-compatible HTTP APIs. Answers come from the same keyword
//! interpretation as the mock backend; selected models can be made to fail.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::ai::{interpret_text, statement_from_prompt};

#[derive(Clone, Default)]
struct ServerState {
    failing: Arc<HashSet<String>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ServerState {
    /// Record the call; Err(response) when the model is set to fail
    fn answer(&self, model: &str, prompt: &str) -> Result<String, Response> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(model.to_string());
        }
        if self.failing.contains(model) {
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                format!("model {} is overloaded", model),
            )
                .into_response());
        }
        Ok(interpret_text(statement_from_prompt(prompt)))
    }
}

/// Mock inference server for testing and development
pub struct MockInferenceServer {
    addr: SocketAddr,
    state: ServerState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockInferenceServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::with_failing_models(&[]).await
    }

    /// Start a server where the listed models answer with HTTP 503
    pub async fn with_failing_models(models: &[&str]) -> Self {
        let state = ServerState {
            failing: Arc::new(models.iter().map(|m| m.to_string()).collect()),
            calls: Arc::default(),
        };

        let app = Router::new()
            // Ollama
            .route("/api/tags", get(handle_ollama_tags))
            .route("/api/generate", post(handle_ollama_generate))
            // OpenAI-compatible
            .route("/v1/models", get(handle_openai_models))
            .route("/v1/chat/completions", post(handle_openai_chat))
            // Gemini
            .route("/v1beta/models", get(handle_gemini_models))
            .route("/v1beta/models/:target", post(handle_gemini_generate))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Models requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state
            .calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockInferenceServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Deserialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
}

async fn handle_ollama_tags() -> Json<Value> {
    Json(json!({
        "models": [{"name": "llama3.2:latest", "size": 2_000_000_000u64}]
    }))
}

async fn handle_ollama_generate(
    State(state): State<ServerState>,
    Json(request): Json<OllamaGenerateRequest>,
) -> Response {
    match state.answer(&request.model, &request.prompt) {
        Ok(text) => Json(json!({
            "model": request.model,
            "response": text,
            "done": true,
        }))
        .into_response(),
        Err(resp) => resp,
    }
}

#[derive(Deserialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

async fn handle_openai_models() -> Json<Value> {
    Json(json!({"object": "list", "data": [{"id": "gpt-4o-mini", "object": "model"}]}))
}

async fn handle_openai_chat(
    State(state): State<ServerState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let prompt = request
        .messages
        .last()
        .map(|m| m.content.as_str())
        .unwrap_or_default();

    match state.answer(&request.model, prompt) {
        Ok(text) => Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": text},
                "finish_reason": "stop"
            }]
        }))
        .into_response(),
        Err(resp) => resp,
    }
}

async fn handle_gemini_models() -> Json<Value> {
    Json(json!({"models": [{"name": "models/gemini-2.5-flash"}]}))
}

/// `POST /v1beta/models/{model}:generateContent`
async fn handle_gemini_generate(
    State(state): State<ServerState>,
    Path(target): Path<String>,
    Json(request): Json<Value>,
) -> Response {
    let Some(model) = target.strip_suffix(":generateContent") else {
        return (StatusCode::NOT_FOUND, "unknown method").into_response();
    };
    let prompt = request["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default();

    match state.answer(model, prompt) {
        // Real Gemini answers frequently arrive fenced
        Ok(text) => Json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": format!("```json\n{}\n```", text)}]
                },
                "finishReason": "STOP"
            }]
        }))
        .into_response(),
        Err(resp) => resp,
    }
}
