//! End-to-end tests over the full router with a mocked instruction source.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use wayfind::AppState;
use wayfind::config::{AppConfig, LimitConfig, ServerConfig, SessionConfig};
use wayfind::generator::{Choice, GenerateError, Instruction, InstructionSource};
use wayfind::limit::RateLimiter;
use wayfind::pipeline::ExplorationService;
use wayfind::server::build_router;
use wayfind::session::SessionStore;

fn sample_instruction() -> Instruction {
    Instruction {
        question: "Which landmark do you visit first?".to_string(),
        choices: vec![
            Choice {
                option: "The cathedral".to_string(),
                next_action: "Walk to the cathedral square and study the facade".to_string(),
            },
            Choice {
                option: "The riverbank".to_string(),
                next_action: "Follow the river path until the old bridge".to_string(),
            },
        ],
    }
}

struct MockSource(Box<dyn Fn() -> Result<Instruction, GenerateError> + Send + Sync>);

#[async_trait::async_trait]
impl InstructionSource for MockSource {
    async fn generate(
        &self,
        _location: &str,
        _recent: &[Instruction],
    ) -> Result<Instruction, GenerateError> {
        (self.0)()
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            environment: "test".to_string(),
        },
        session: SessionConfig {
            timeout_secs: 3600,
            sweep_interval_secs: 60,
        },
        limit: LimitConfig {
            max_requests: 1000,
            window_secs: 60,
        },
    }
}

fn server_with(source: MockSource, config: AppConfig) -> TestServer {
    let state = AppState {
        service: Arc::new(ExplorationService::new(
            SessionStore::new(),
            Arc::new(source),
        )),
        limiter: Arc::new(RateLimiter::new(
            config.limit.max_requests,
            std::time::Duration::from_secs(config.limit.window_secs),
        )),
        config: Arc::new(config),
    };
    TestServer::new(build_router(state)).expect("failed to build test server")
}

fn server() -> TestServer {
    server_with(MockSource(Box::new(|| Ok(sample_instruction()))), test_config())
}

#[tokio::test]
async fn create_session_returns_uuid_v4() {
    let server = server();

    let resp = server
        .post("/explorations/sessions")
        .json(&json!({"location": "Paris"}))
        .await;

    assert_eq!(resp.status_code(), StatusCode::CREATED);
    let body: Value = resp.json();
    assert_eq!(body["location"], "Paris");
    assert!(body["createdAt"].is_string());

    let id = body["sessionId"].as_str().unwrap();
    let parsed = uuid::Uuid::parse_str(id).unwrap();
    assert_eq!(parsed.get_version_num(), 4);
}

#[tokio::test]
async fn create_session_without_location_is_rejected() {
    let server = server();

    let resp = server
        .post("/explorations/sessions")
        .json(&json!({"metadata": {"source": "test"}}))
        .await;

    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["code"], "MISSING_LOCATION");
}

#[tokio::test]
async fn create_session_with_out_of_bounds_location_is_rejected() {
    let server = server();

    let resp = server
        .post("/explorations/sessions")
        .json(&json!({"location": "x"}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["code"], "INVALID_LOCATION");

    let resp = server
        .post("/explorations/sessions")
        .json(&json!({"location": "x".repeat(201)}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["code"], "INVALID_LOCATION");
}

#[tokio::test]
async fn malformed_session_id_is_rejected_before_the_pipeline() {
    let server = server();

    let resp = server.get("/explorations/not-a-uuid/instruction").await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["code"], "INVALID_SESSION_ID");

    let resp = server.get("/explorations/not-a-uuid").await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["code"], "INVALID_SESSION_ID");
}

#[tokio::test]
async fn full_session_lifecycle() {
    let server = server();

    let created: Value = server
        .post("/explorations/sessions")
        .json(&json!({"location": "Paris"}))
        .await
        .json();
    let id = created["sessionId"].as_str().unwrap().to_string();

    let resp = server.get(&format!("/explorations/{id}/instruction")).await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    let body: Value = resp.json();
    assert_eq!(body["sessionId"], id.as_str());
    assert_eq!(body["location"], "Paris");
    assert_eq!(
        body["instruction"]["question"],
        "Which landmark do you visit first?"
    );
    assert!(body["timestamp"].is_string());

    let detail: Value = server.get(&format!("/explorations/{id}")).await.json();
    assert_eq!(detail["instructionCount"], 1);
    assert_eq!(detail["previousInstructions"].as_array().unwrap().len(), 1);
    assert_eq!(detail["location"], "Paris");

    let resp = server.delete(&format!("/explorations/{id}")).await;
    assert_eq!(resp.status_code(), StatusCode::NO_CONTENT);
    assert!(resp.as_bytes().is_empty());

    let resp = server.get(&format!("/explorations/{id}")).await;
    assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(resp.json::<Value>()["code"], "SESSION_NOT_FOUND");

    let resp = server.delete(&format!("/explorations/{id}")).await;
    assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_session_id_is_auto_created_with_a_fresh_id() {
    let server = server();
    let unknown = uuid::Uuid::new_v4().to_string();

    let resp = server
        .get(&format!("/explorations/{unknown}/instruction"))
        .add_query_param("location", "Rome")
        .await;

    assert_eq!(resp.status_code(), StatusCode::OK);
    let body: Value = resp.json();
    // The store mints a fresh id; the path id is never reused.
    assert_ne!(body["sessionId"].as_str().unwrap(), unknown);
    assert_eq!(body["location"], "Rome");
}

#[tokio::test]
async fn instruction_without_any_location_is_rejected() {
    let server = server();
    let unknown = uuid::Uuid::new_v4().to_string();

    let resp = server
        .get(&format!("/explorations/{unknown}/instruction"))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["code"], "MISSING_LOCATION");
}

#[tokio::test]
async fn query_location_overrides_and_updates_the_session() {
    let server = server();

    let created: Value = server
        .post("/explorations/sessions")
        .json(&json!({"location": "Paris"}))
        .await
        .json();
    let id = created["sessionId"].as_str().unwrap().to_string();

    let body: Value = server
        .get(&format!("/explorations/{id}/instruction"))
        .add_query_param("location", "Lyon")
        .await
        .json();
    assert_eq!(body["location"], "Lyon");

    let detail: Value = server.get(&format!("/explorations/{id}")).await.json();
    assert_eq!(detail["location"], "Lyon");
}

#[tokio::test]
async fn backend_failure_maps_to_503() {
    let server = server_with(
        MockSource(Box::new(|| {
            Err(GenerateError::Unavailable("connection refused".to_string()))
        })),
        test_config(),
    );

    let created: Value = server
        .post("/explorations/sessions")
        .json(&json!({"location": "Paris"}))
        .await
        .json();
    let id = created["sessionId"].as_str().unwrap().to_string();

    let resp = server.get(&format!("/explorations/{id}/instruction")).await;
    assert_eq!(resp.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.json::<Value>()["code"], "GENERATION_UNAVAILABLE");

    // Failed generations never reach the history.
    let detail: Value = server.get(&format!("/explorations/{id}")).await.json();
    assert_eq!(detail["instructionCount"], 0);
}

#[tokio::test]
async fn invalid_generated_content_maps_to_422() {
    let server = server_with(
        MockSource(Box::new(|| {
            Err(GenerateError::Invalid("question exceeds 25 words".to_string()))
        })),
        test_config(),
    );

    let created: Value = server
        .post("/explorations/sessions")
        .json(&json!({"location": "Paris"}))
        .await
        .json();
    let id = created["sessionId"].as_str().unwrap().to_string();

    let resp = server.get(&format!("/explorations/{id}/instruction")).await;
    assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = resp.json();
    assert_eq!(body["code"], "INVALID_INSTRUCTION");
    assert!(body["details"].as_str().unwrap().contains("25 words"));
}

#[tokio::test]
async fn listing_reports_summaries_without_history() {
    let server = server();

    for location in ["Paris", "Rome"] {
        server
            .post("/explorations/sessions")
            .json(&json!({"location": location}))
            .await;
    }

    let body: Value = server.get("/explorations").await.json();
    assert_eq!(body["total"], 2);
    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions[0].get("previousInstructions").is_none());
    assert!(sessions[0]["instructionCount"].is_number());
}

#[tokio::test]
async fn health_reports_environment() {
    let server = server();

    let resp = server.get("/health").await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    let body: Value = resp.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "test");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn unmatched_routes_return_the_fallback_body() {
    let server = server();

    let resp = server.get("/nope/nothing").await;
    assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
    let body: Value = resp.json();
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["path"], "/nope/nothing");
}

#[tokio::test]
async fn over_limit_requests_get_429_with_retry_after() {
    let mut config = test_config();
    config.limit.max_requests = 3;
    let server = server_with(MockSource(Box::new(|| Ok(sample_instruction()))), config);

    for _ in 0..3 {
        let resp = server.get("/health").await;
        assert_eq!(resp.status_code(), StatusCode::OK);
    }

    let resp = server.get("/health").await;
    assert_eq!(resp.status_code(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = resp.json();
    assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
    assert!(body["retryAfter"].as_u64().unwrap() >= 1);
}
