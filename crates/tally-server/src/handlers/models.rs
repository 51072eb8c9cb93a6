//! Interpreter configuration handler

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use tally_core::{AIBackend, ChainInfo};

use crate::AppState;

#[derive(Serialize)]
pub struct ModelsResponse {
    pub configured: bool,
    #[serde(flatten)]
    pub chain: Option<ChainInfo>,
    pub available: bool,
    /// Credential variable the backend is missing, if any
    pub missing_credential: Option<&'static str>,
    pub prompt_version: Option<u32>,
    pub prompt_override: bool,
}

/// Backend, host and model chain used for interpretation
pub async fn get_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let Some(interpreter) = state.interpreter.as_ref() else {
        return Json(ModelsResponse {
            configured: false,
            chain: None,
            available: false,
            missing_credential: None,
            prompt_version: None,
            prompt_override: false,
        });
    };

    let prompt = interpreter.prompt();
    Json(ModelsResponse {
        configured: true,
        chain: Some(interpreter.info()),
        available: interpreter.client().health_check().await,
        missing_credential: interpreter.client().missing_credential(),
        prompt_version: Some(prompt.metadata.version),
        prompt_override: prompt.is_override(),
    })
}
