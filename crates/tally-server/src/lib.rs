//! Tally Web Server
//!
//! Axum-based REST API for the Tally expense ledger.
//!
//! Security features:
//! - Cloudflare Access / API key authentication (secure by default, use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Input validation (pagination limits, empty statements)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    handler::HandlerWithoutStateExt,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use tally_core::db::{Database, DB_KEY_ENV};
use tally_core::{AIBackend, Interpreter};

mod handlers;

/// Maximum (and default) number of records returned by a list request
pub const MAX_PAGE_LIMIT: usize = 100;

/// Cloudflare Access header for authenticated user email
const CF_ACCESS_USER_HEADER: &str = "cf-access-authenticated-user-email";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys for service authentication (alternative to Cloudflare Access)
    /// Format: "Bearer <key>" in Authorization header
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

impl ServerConfig {
    /// Read `TALLY_API_KEYS` and `TALLY_ALLOWED_ORIGINS` (comma-separated)
    pub fn from_env(require_auth: bool) -> Self {
        Self {
            require_auth,
            allowed_origins: split_list(std::env::var("TALLY_ALLOWED_ORIGINS").ok()),
            api_keys: split_list(std::env::var("TALLY_API_KEYS").ok()),
        }
    }
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// None when the selected AI backend is missing required settings
    pub interpreter: Option<Interpreter>,
}

/// Authentication middleware - accepts Cloudflare Access headers or API keys
///
/// # Security Notes
///
/// **Cloudflare Access headers**: The `CF-Access-Authenticated-User-Email` header
/// is safe behind Cloudflare Tunnel (which strips/rewrites CF headers), but can be
/// spoofed if the server is exposed directly to the internet.
///
/// **API keys**: Compared using constant-time comparison to prevent timing attacks.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    let cf_user = request
        .headers()
        .get(CF_ACCESS_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    if let Some(email) = cf_user {
        info!(user = %email, path = %request.uri().path(), "Authenticated via Cloudflare Access header");
        return next.run(request).await;
    }

    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        info!(user = "api-key", path = %request.uri().path(), "Authenticated via API key");
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Validate an API key against the configured keys using constant-time comparison
/// to prevent timing attacks.
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    valid_keys.iter().any(|key| {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// Owner identity for the request
///
/// Returns the CF Access email, "api-key" for API key auth, or "local-dev" when
/// unauthenticated. Records are partitioned by this value.
pub fn get_user_email(headers: &axum::http::HeaderMap) -> String {
    if let Some(email) = headers
        .get(CF_ACCESS_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return email.to_string();
    }

    if headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .is_some()
    {
        return "api-key".to_string();
    }

    "local-dev".to_string()
}

/// Create the application router, building the interpreter from the environment
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    create_router_with_interpreter(db, static_dir, config, load_interpreter())
}

/// Interpreter for the configured backend, or None when it cannot be built
fn load_interpreter() -> Option<Interpreter> {
    match Interpreter::from_env() {
        Ok(Some(interpreter)) => {
            let info = interpreter.info();
            info!(
                "AI backend configured: {} at {} (models: {})",
                info.backend,
                info.host,
                info.models.join(" -> ")
            );
            Some(interpreter)
        }
        Ok(None) => {
            warn!("AI backend not configured; POST /api/expenses will fail (check AI_BACKEND and its host variable)");
            None
        }
        Err(e) => {
            error!(error = %e, "Failed to load interpreter configuration");
            None
        }
    }
}

/// Create the application router with an explicit interpreter (for testing)
pub fn create_router_with_interpreter(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    interpreter: Option<Interpreter>,
) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        interpreter,
    });

    let api_routes = Router::new()
        // Auth
        .route("/me", get(handlers::get_me))
        // Expenses
        .route(
            "/expenses",
            post(handlers::add_expense).get(handlers::list_expenses),
        )
        .route("/expenses/summary", get(handlers::get_summary))
        // Interpreter
        .route("/models", get(handlers::get_models))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        // Unauthenticated
        .route("/health", get(handlers::health));

    // Build CORS layer
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .route("/", get(handlers::health))
        .nest("/api", api_routes);

    // Serve static files if directory provided; unknown paths still get a JSON 404
    app = match static_dir {
        Some(dir) => app.fallback_service(
            ServeDir::new(dir).not_found_service(handlers::not_found.into_service()),
        ),
        None => app.fallback(handlers::not_found),
    };

    app.with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ))
}

/// Start the server
pub async fn serve(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> anyhow::Result<()> {
    serve_with_config(db, host, port, static_dir, ServerConfig::from_env(true)).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    log_startup_checks(&db, &config);

    let interpreter = load_interpreter();
    if let Some(interpreter) = &interpreter {
        check_ai_connection(interpreter).await;
    }
    let app = create_router_with_interpreter(db, static_dir, config, interpreter);

    let addr = format!("{}:{}", host, port);
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Warn about settings that are missing but not fatal
fn log_startup_checks(db: &Database, config: &ServerConfig) {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    } else if config.api_keys.is_empty() {
        info!("No TALLY_API_KEYS set; only Cloudflare Access requests will be accepted");
    }

    if !db.is_encrypted() {
        warn!(
            "⚠️  Database {} is not encrypted (set {} to enable encryption)",
            db.path(),
            DB_KEY_ENV
        );
    }
}

/// Check and log AI backend connection status
async fn check_ai_connection(interpreter: &Interpreter) {
    let client = interpreter.client();
    if let Some(var) = client.missing_credential() {
        warn!("⚠️  {} is not set; the {} backend will reject every request", var, client.kind());
    }
    if client.health_check().await {
        info!("✅ AI backend reachable: {}", client.host());
    } else {
        warn!("⚠️  AI backend configured but not responding: {}", client.host());
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn service_unavailable(msg: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        match err.downcast_ref::<tally_core::Error>() {
            Some(tally_core::Error::InvalidInput(msg)) => Self::bad_request(msg),
            Some(tally_core::Error::NotFound(msg)) => Self::not_found(msg),
            Some(tally_core::Error::Interpretation(_)) => {
                warn!(error = %err, "Interpretation failed");
                Self {
                    status: StatusCode::BAD_GATEWAY,
                    message: err.to_string(),
                    internal: None,
                }
            }
            _ => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(err),
            },
        }
    }
}

#[cfg(test)]
mod tests;
