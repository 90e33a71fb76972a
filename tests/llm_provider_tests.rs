use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use study_planner::{LLMConfig, LLMProvider, LLMProviderFactory, LLMProviderType};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn openai_echo(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if auth != "Bearer sk-moonshot" {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"})));
    }
    let reply = format!(
        "model={} temperature={} max_tokens={} system={}",
        body["model"].as_str().unwrap_or_default(),
        body["temperature"],
        body["max_tokens"],
        body["messages"][0]["content"].as_str().unwrap_or_default()
    );
    (
        StatusCode::OK,
        Json(json!({"choices": [{"message": {"role": "assistant", "content": reply}}]})),
    )
}

async fn gemini_echo(
    Path(action): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if action != "gemini-test:generateContent" || params.get("key").map(String::as_str) != Some("g-key") {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "unknown model or key"})));
    }
    let text = format!(
        "maxOutputTokens={} prompt={}",
        body["generationConfig"]["maxOutputTokens"],
        body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default()
    );
    (
        StatusCode::OK,
        Json(json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})),
    )
}

async fn empty_choices() -> Json<Value> {
    Json(json!({"choices": []}))
}

#[tokio::test]
async fn test_moonshot_speaks_openai_protocol() {
    let base = serve(Router::new().route("/v1/chat/completions", post(openai_echo))).await;

    let mut config = LLMConfig::for_provider(LLMProviderType::Moonshot, "sk-moonshot", Some(format!("{}/v1", base)));
    config.temperature = 0.2;
    config.max_tokens = 512;
    let provider = LLMProviderFactory::create_provider(&config).unwrap();

    let reply = provider.make_request(Some("be terse"), "hello").await.unwrap();
    assert_eq!(reply, "model=moonshot-v1-8k temperature=0.2 max_tokens=512 system=be terse");
    assert_eq!(provider.provider_name(), "Moonshot");
}

#[tokio::test]
async fn test_wrong_key_surfaces_status_and_body() {
    let base = serve(Router::new().route("/v1/chat/completions", post(openai_echo))).await;

    let config = LLMConfig::for_provider(LLMProviderType::OpenAI, "sk-wrong", Some(format!("{}/v1", base)));
    let provider = LLMProviderFactory::create_provider(&config).unwrap();

    let err = provider.make_request(None, "hello").await.unwrap_err().to_string();
    assert!(err.contains("401"), "unexpected error: {}", err);
    assert!(err.contains("bad key"), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_empty_choice_list_is_an_error() {
    let base = serve(Router::new().route("/v1/chat/completions", post(empty_choices))).await;

    let config = LLMConfig::for_provider(LLMProviderType::OpenAI, "sk", Some(format!("{}/v1", base)));
    let provider = LLMProviderFactory::create_provider(&config).unwrap();

    let err = provider.make_request(None, "hello").await.unwrap_err();
    assert!(err.to_string().contains("No choices"));
}

#[tokio::test]
async fn test_gemini_request_shape() {
    let base = serve(Router::new().route("/v1beta/models/:action", post(gemini_echo))).await;

    let mut config = LLMConfig::for_provider(LLMProviderType::Gemini, "g-key", Some(format!("{}/v1beta", base)));
    config.model = Some("gemini-test".to_string());
    config.max_tokens = 1024;
    let provider = LLMProviderFactory::create_provider(&config).unwrap();
    assert!(matches!(provider, LLMProvider::Gemini(_)));

    let reply = provider.make_request(Some("system"), "question").await.unwrap();
    assert_eq!(reply, "maxOutputTokens=1024 prompt=system\n\nquestion");
}
