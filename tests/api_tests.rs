use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use axum_test::TestServer;
use futures_util::future::join_all;
use serde_json::{json, Value};
use std::future::IntoFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use study_planner::{
    api::{create_router, AppState},
    GenerationConfig, LLMConfig, LLMProviderType, LLMService,
};

/// Stands in for an OpenAI-compatible chat-completion endpoint.
#[derive(Clone)]
struct MockLlm {
    reply: Arc<String>,
    status: StatusCode,
    calls: Arc<AtomicUsize>,
}

async fn chat_completions(State(mock): State<MockLlm>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    mock.calls.fetch_add(1, Ordering::SeqCst);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");

    if mock.status != StatusCode::OK {
        return (mock.status, Json(json!({"error": {"message": "upstream exploded"}})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "choices": [{"message": {"role": "assistant", "content": mock.reply.as_str()}}]
        })),
    )
}

async fn spawn_mock_llm(reply: &str, status: StatusCode) -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mock = MockLlm {
        reply: Arc::new(reply.to_string()),
        status,
        calls: calls.clone(),
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/v1", addr), calls)
}

async fn create_test_server(reply: &str, status: StatusCode) -> (TestServer, Arc<AtomicUsize>) {
    let (base_url, calls) = spawn_mock_llm(reply, status).await;
    let mut config = LLMConfig::for_provider(LLMProviderType::OpenAI, "test_key", Some(base_url));
    config.retry_backoff_ms = 0;
    config.timeout_secs = 5;

    let llm_service = LLMService::new(&config, GenerationConfig::default()).unwrap();
    let app = create_router(AppState { llm_service });
    (TestServer::new(app).unwrap(), calls)
}

fn scenario_plan_request() -> Value {
    json!({
        "subjects": ["Math", "English"],
        "startDate": "2024-03-01",
        "endDate": "2024-03-01",
        "dailyHours": 2
    })
}

#[tokio::test]
async fn test_api_health() {
    let (server, _) = create_test_server("[]", StatusCode::OK).await;

    let response = server.get("/api/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["provider"], "OpenAI");
}

#[tokio::test]
async fn test_api_generate_plan_rescales_days() {
    let reply = r#"[{"subject":"Math","duration":1.5,"date":"2024-03-01"},{"subject":"English","duration":1.0,"date":"2024-03-01"}]"#;
    let (server, calls) = create_test_server(reply, StatusCode::OK).await;

    let response = server.post("/api/generate-plan").json(&scenario_plan_request()).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["stage"], "direct");
    assert_eq!(body["data"]["rescaledDays"], json!(["2024-03-01"]));

    let tasks = body["data"]["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["id"], "task-1");
    assert_eq!(tasks[0]["duration"], 1.2);
    assert_eq!(tasks[1]["duration"], 0.8);
    assert_eq!(tasks[1]["completed"], false);
    assert_eq!(body["data"]["summary"]["totalHours"], 2.0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_api_generate_plan_from_fenced_reply() {
    let reply = "Here you go:\n```json\n[{\"subject\":\"Math\",\"duration\":2,\"date\":\"2024-03-01\"}]\n```";
    let (server, _) = create_test_server(reply, StatusCode::OK).await;

    let response = server.post("/api/generate-plan").json(&scenario_plan_request()).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["stage"], "fenced");
    assert_eq!(body["data"]["tasks"][0]["description"], "Study Math");
    assert_eq!(body["data"]["rescaledDays"], json!([]));
}

#[tokio::test]
async fn test_api_generate_plan_unrecoverable_reply() {
    let (server, _) = create_test_server("I cannot do that, sorry.", StatusCode::OK).await;

    let response = server.post("/api/generate-plan").json(&scenario_plan_request()).await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Failed to generate the study plan, please retry.");
}

#[tokio::test]
async fn test_api_generate_plan_rejects_reversed_dates() {
    let (server, calls) = create_test_server("[]", StatusCode::OK).await;

    let response = server
        .post("/api/generate-plan")
        .json(&json!({
            "subjects": ["Math"],
            "startDate": "2024-03-05",
            "endDate": "2024-03-01",
            "dailyHours": 2
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("before start date"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_api_generate_plan_rejects_oversized_requests() {
    let (server, calls) = create_test_server("[]", StatusCode::OK).await;

    for body in [
        json!({"subjects": ["Math"], "startDate": "2024-03-01", "endDate": "2024-03-01", "dailyHours": 1e300}),
        json!({"subjects": ["Math"], "startDate": "2024-03-01", "endDate": "2024-03-01", "dailyHours": 25}),
        json!({"subjects": ["Math"], "startDate": "0001-01-01", "endDate": "9999-12-31", "dailyHours": 2}),
    ] {
        let response = server.post("/api/generate-plan").json(&body).await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_api_generate_plan_unsatisfiable_day_is_unprocessable() {
    let reply = r#"[{"subject":"Math","duration":1,"date":"2024-03-01"},{"subject":"English","duration":1,"date":"2024-03-01"},{"subject":"Math","duration":1,"date":"2024-03-01"}]"#;
    let (server, calls) = create_test_server(reply, StatusCode::OK).await;

    let response = server
        .post("/api/generate-plan")
        .json(&json!({
            "subjects": ["Math", "English"],
            "startDate": "2024-03-01",
            "endDate": "2024-03-01",
            "dailyHours": 0.01
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("Cannot rescale tasks on 2024-03-01"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_api_provider_failure_is_retried_then_unavailable() {
    let (server, calls) = create_test_server("", StatusCode::INTERNAL_SERVER_ERROR).await;

    let response = server.post("/api/generate-plan").json(&scenario_plan_request()).await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_api_generate_questions() {
    let reply = r#"```json
{
  "questions": [
    {"content": "Which keyword moves ownership into a closure?", "type": "choice",
     "options": ["ref", "move", "mut", "box"], "answer": "B", "analysis": "move closures take ownership"},
    {"content": "Vec<T> is heap allocated.", "type": "judge", "answer": "true", "analysis": ""},
  ]
}
```"#;
    let (server, _) = create_test_server(reply, StatusCode::OK).await;

    let response = server
        .post("/api/generate-questions")
        .json(&json!({
            "courseName": "  Rust Basics ",
            "types": ["choice", "judge", "choice"]
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["stage"], "repaired");

    let questions = body["data"]["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["id"], "q-1");
    assert_eq!(questions[0]["type"], "choice");
    assert_eq!(questions[0]["options"].as_array().unwrap().len(), 4);
    assert_eq!(questions[0]["subject"], "Rust Basics");
    assert_eq!(questions[1]["type"], "judge");
    assert!(questions[1].get("options").is_none());
}

#[tokio::test]
async fn test_api_generate_questions_validation() {
    let (server, calls) = create_test_server("[]", StatusCode::OK).await;

    let response = server
        .post("/api/generate-questions")
        .json(&json!({"types": ["essay"]}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/generate-questions")
        .json(&json!({"courseName": "Rust", "types": ["crossword"]}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_api_verify_answer() {
    let (server, _) = create_test_server("[]", StatusCode::OK).await;
    let question = json!({
        "id": "q-1",
        "content": "What is 2 + 2?",
        "type": "choice",
        "options": ["3", "4", "5"],
        "answer": "B",
        "analysis": "Basic addition",
        "subject": "Arithmetic"
    });

    let response = server
        .post("/api/questions/verify")
        .json(&json!({"question": question, "userAnswer": "4"}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["isCorrect"], true);
    assert!(body["data"].get("correctAnswer").is_none());
    assert_eq!(body["data"]["analysis"], "Basic addition");

    let response = server
        .post("/api/questions/verify")
        .json(&json!({"question": question, "userAnswer": "C"}))
        .await;
    let body: Value = response.json();
    assert_eq!(body["data"]["isCorrect"], false);
    assert_eq!(body["data"]["correctAnswer"], "B");
}

#[tokio::test]
async fn test_api_verify_multiple_choice_list() {
    let (server, _) = create_test_server("[]", StatusCode::OK).await;

    let response = server
        .post("/api/questions/verify")
        .json(&json!({
            "question": {
                "id": "q-2",
                "content": "Which are smart pointers?",
                "type": "multiple",
                "options": ["Box", "i32", "Rc"],
                "answer": ["A", "C"],
                "subject": "Rust"
            },
            "userAnswer": ["C", "A"]
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["isCorrect"], true);
    assert_eq!(body["data"]["analysis"], "");
}

#[tokio::test]
async fn test_api_concurrent_plan_requests() {
    let reply = r#"{"plan": [{"subject":"Math","description":"Drill","duration":3,"date":"2024-03-01"}]}"#;
    let (server, calls) = create_test_server(reply, StatusCode::OK).await;
    let request = scenario_plan_request();

    let responses = join_all(
        (0..8).map(|_| server.post("/api/generate-plan").json(&request).into_future()),
    )
    .await;

    for response in responses {
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["tasks"][0]["duration"], 2.0);
        assert_eq!(body["data"]["tasks"][0]["id"], "task-1");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 8);
}
