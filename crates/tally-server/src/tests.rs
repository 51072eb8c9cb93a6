//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::time::Duration;
use tally_core::{
    AIClient, GeminiBackend, MockBackend, MockReply, ModelChain, Prompt, PromptId,
};
use tower::ServiceExt;

fn mock_interpreter(backend: MockBackend) -> Interpreter {
    Interpreter::new(
        AIClient::Mock(backend),
        ModelChain::new(["mock-primary", "mock-fallback"], Duration::from_secs(5)),
        Prompt::embedded(PromptId::ParseExpense).unwrap(),
    )
}

fn setup_test_app() -> Router {
    setup_test_app_with(MockBackend::new())
}

fn setup_test_app_with(backend: MockBackend) -> Router {
    let db = Database::in_memory().unwrap();
    let config = ServerConfig {
        require_auth: false,
        ..Default::default()
    };
    create_router_with_interpreter(db, None, config, Some(mock_interpreter(backend)))
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_expense(text: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/expenses")
        .header("content-type", "application/json")
        .body(Body::from(text.to_string()))
        .unwrap()
}

// ========== Health ==========

#[tokio::test]
async fn test_health_endpoints() {
    let app = setup_test_app();

    for uri in ["/", "/api/health"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = get_body_json(response).await;
        assert_eq!(json["status"], "OK");
        assert!(json["timestamp"].is_string());
    }
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let app = setup_test_app();

    let response = app.oneshot(get("/api/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Route not found");
    assert_eq!(json["path"], "/api/nope");
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = setup_test_app();

    let response = app.oneshot(get("/api/health")).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("content-security-policy").is_some());
}

// ========== Expenses ==========

#[tokio::test]
async fn test_add_expense_returns_created_record() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_expense(serde_json::json!({"text": "  200 dosa idly "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = get_body_json(response).await;
    assert_eq!(json["message"], "Expense added successfully");
    let expense = &json["expense"];
    assert_eq!(expense["raw_text"], "200 dosa idly");
    assert_eq!(expense["direction"], "expense");
    assert_eq!(expense["category"], "Food");
    assert_eq!(expense["amount"], 200.0);
    assert_eq!(expense["owner_id"], "local-dev");
}

#[tokio::test]
async fn test_add_expense_rejects_blank_text() {
    let backend = MockBackend::new();
    let app = setup_test_app_with(backend.clone());

    for body in [serde_json::json!({"text": "   "}), serde_json::json!({})] {
        let response = app.clone().oneshot(post_expense(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = get_body_json(response).await;
        assert_eq!(json["error"], "Please provide expense text");
    }
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_add_expense_falls_back_to_next_model() {
    let backend = MockBackend::new().failing("mock-primary");
    let app = setup_test_app_with(backend.clone());

    let response = app
        .oneshot(post_expense(serde_json::json!({"text": "50 auto fare"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(backend.calls(), vec!["mock-primary", "mock-fallback"]);
}

#[tokio::test]
async fn test_add_expense_all_models_fail_is_bad_gateway() {
    let backend = MockBackend::new()
        .with_reply("mock-primary", MockReply::Text("sorry, no idea".into()))
        .with_reply("mock-fallback", MockReply::Fail("quota exceeded".into()));
    let app = setup_test_app_with(backend);

    let response = app
        .clone()
        .oneshot(post_expense(serde_json::json!({"text": "200 dosa"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("quota exceeded"));

    // Nothing stored
    let response = app.oneshot(get("/api/expenses")).await.unwrap();
    let json = get_body_json(response).await;
    assert!(json["expenses"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_add_expense_without_backend_is_unavailable() {
    let config = ServerConfig {
        require_auth: false,
        ..Default::default()
    };
    let app = create_router_with_interpreter(Database::in_memory().unwrap(), None, config, None);

    let response = app
        .oneshot(post_expense(serde_json::json!({"text": "200 dosa"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_list_expenses_newest_first_with_limit() {
    let app = setup_test_app();

    for text in ["100 lunch", "40 bus", "income 500 salary"] {
        let response = app
            .clone()
            .oneshot(post_expense(serde_json::json!({"text": text})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app.clone().oneshot(get("/api/expenses")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let expenses = json["expenses"].as_array().unwrap();
    assert_eq!(expenses.len(), 3);
    assert_eq!(expenses[0]["raw_text"], "income 500 salary");
    assert_eq!(expenses[2]["raw_text"], "100 lunch");

    let response = app.oneshot(get("/api/expenses?limit=2")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["expenses"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_summary_nets_income_against_expense() {
    let app = setup_test_app();

    for text in ["100 lunch", "income 40 refund"] {
        app.clone()
            .oneshot(post_expense(serde_json::json!({"text": text})))
            .await
            .unwrap();
    }

    let response = app.oneshot(get("/api/expenses/summary")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["today_total"], 60.0);
    assert_eq!(json["period_total"], 60.0);
    assert_eq!(json["today_count"], 2);
    assert_eq!(json["category_breakdown"]["Food"]["expense"], 100.0);
    assert_eq!(json["category_breakdown"]["Income"]["income"], 40.0);
}

#[tokio::test]
async fn test_records_are_partitioned_by_owner() {
    let app = setup_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/expenses")
        .header("content-type", "application/json")
        .header(CF_ACCESS_USER_HEADER, "alice@example.com")
        .body(Body::from(r#"{"text": "100 lunch"}"#))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.clone().oneshot(get("/api/expenses")).await.unwrap();
    let json = get_body_json(response).await;
    assert!(json["expenses"].as_array().unwrap().is_empty());

    let request = Request::builder()
        .uri("/api/expenses")
        .header(CF_ACCESS_USER_HEADER, "alice@example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["expenses"].as_array().unwrap().len(), 1);
}

// ========== Models ==========

#[tokio::test]
async fn test_models_reports_chain() {
    let app = setup_test_app();

    let response = app.oneshot(get("/api/models")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["configured"], true);
    assert_eq!(json["backend"], "mock");
    assert_eq!(
        json["models"],
        serde_json::json!(["mock-primary", "mock-fallback"])
    );
    assert_eq!(json["timeout_secs"], 5);
    assert_eq!(json["available"], true);
    assert_eq!(json["prompt_override"], false);
}

#[tokio::test]
async fn test_models_reports_missing_gemini_key() {
    let interpreter = Interpreter::new(
        AIClient::Gemini(GeminiBackend::new("http://127.0.0.1:1", None)),
        ModelChain::new(["gemini-2.5-flash"], Duration::from_secs(1)),
        Prompt::embedded(PromptId::ParseExpense).unwrap(),
    );
    let config = ServerConfig {
        require_auth: false,
        ..Default::default()
    };
    let app =
        create_router_with_interpreter(Database::in_memory().unwrap(), None, config, Some(interpreter));

    let response = app.oneshot(get("/api/models")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["backend"], "gemini");
    assert_eq!(json["missing_credential"], "GEMINI_API_KEY");
    assert_eq!(json["available"], false);
}

#[tokio::test]
async fn test_startup_connection_check_uses_given_interpreter() {
    let backend = MockBackend::new();
    let interpreter = mock_interpreter(backend.clone());

    check_ai_connection(&interpreter).await;
    assert!(backend.calls().is_empty());
    assert_eq!(interpreter.client().missing_credential(), None);
}

// ========== Auth ==========

fn auth_app() -> Router {
    let config = ServerConfig {
        require_auth: true,
        allowed_origins: vec![],
        api_keys: vec!["secret-key-123".to_string()],
    };
    create_router_with_interpreter(
        Database::in_memory().unwrap(),
        None,
        config,
        Some(mock_interpreter(MockBackend::new())),
    )
}

#[tokio::test]
async fn test_auth_required_rejects_anonymous() {
    let app = auth_app();

    let response = app.clone().oneshot(get("/api/expenses")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Authentication required");

    // Health stays open
    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_accepts_valid_api_key() {
    let app = auth_app();

    let request = Request::builder()
        .uri("/api/me")
        .header("authorization", "Bearer secret-key-123")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["user"], "api-key");
    assert_eq!(json["auth_method"], "api_key");

    let request = Request::builder()
        .uri("/api/me")
        .header("authorization", "Bearer wrong-key-123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_accepts_cloudflare_header() {
    let app = auth_app();

    let request = Request::builder()
        .uri("/api/me")
        .header(CF_ACCESS_USER_HEADER, "alice@example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["user"], "alice@example.com");
    assert_eq!(json["auth_method"], "cloudflare_header");
}

#[test]
fn test_validate_api_key() {
    let keys = vec!["abc".to_string(), "longer-key".to_string()];
    assert!(validate_api_key("abc", &keys));
    assert!(validate_api_key("longer-key", &keys));
    assert!(!validate_api_key("abd", &keys));
    assert!(!validate_api_key("ab", &keys));
    assert!(!validate_api_key("abc", &[]));
}

#[test]
fn test_app_error_maps_core_errors() {
    let err: AppError = tally_core::Error::InvalidInput("bad".into()).into();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let err: AppError = tally_core::Error::Interpretation("m: boom".into()).into();
    assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

    let err: AppError = tally_core::Error::NotFound("x".into()).into();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    let err: AppError = tally_core::Error::InvalidData("x".into()).into();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_split_list() {
    assert_eq!(
        split_list(Some(" a, b ,,c".to_string())),
        vec!["a", "b", "c"]
    );
    assert!(split_list(None).is_empty());
}
