use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    errors::{ApiError, ErrorContext},
    grading::{verify_answer, SubmittedAnswer, Verdict},
    llm_service::LLMService,
    models::{PlanRequest, Question, QuestionRequest},
    recovery::{PlanOutcome, QuestionOutcome},
};

// Import logging macros
use crate::{log_api_error, log_api_start, log_api_success};

#[derive(Clone)]
pub struct AppState {
    pub llm_service: LLMService,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAnswerRequest {
    pub question: Question,
    pub user_answer: SubmittedAnswer,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

pub async fn generate_plan(
    State(state): State<AppState>,
    Json(request): Json<PlanRequest>,
) -> ApiResult<PlanOutcome> {
    let request_id = Uuid::new_v4();
    log_api_start!("generate_plan", request_id = request_id);

    match state.llm_service.generate_study_plan(&request).await {
        Ok(outcome) => {
            log_api_success!(
                "generate_plan",
                request_id = request_id,
                count = outcome.tasks.len(),
                format!("study plan recovered at {} stage", outcome.stage)
            );
            Ok(Json(ApiResponse::success(outcome)))
        }
        Err(e) => {
            log_api_error!("generate_plan", request_id = request_id, error = e, "study plan generation failed");
            let context = ErrorContext::new("generate_plan", "study plan")
                .with_id(&request_id.to_string())
                .with_user_message("Failed to generate the study plan, please retry.");
            Err(ApiError::from(e).to_response_with_context(context))
        }
    }
}

pub async fn generate_questions(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> ApiResult<QuestionOutcome> {
    let request_id = Uuid::new_v4();
    log_api_start!("generate_questions", request_id = request_id);

    match state.llm_service.generate_questions(&request).await {
        Ok(outcome) => {
            log_api_success!(
                "generate_questions",
                request_id = request_id,
                count = outcome.questions.len(),
                format!("questions recovered at {} stage", outcome.stage)
            );
            Ok(Json(ApiResponse::success(outcome)))
        }
        Err(e) => {
            log_api_error!("generate_questions", request_id = request_id, error = e, "question generation failed");
            let context = ErrorContext::new("generate_questions", "questions")
                .with_id(&request_id.to_string())
                .with_user_message("Failed to generate questions, please retry.");
            Err(ApiError::from(e).to_response_with_context(context))
        }
    }
}

pub async fn verify_question_answer(Json(request): Json<VerifyAnswerRequest>) -> ApiResult<Verdict> {
    if request.question.content.trim().is_empty() {
        let context = ErrorContext::new("verify_answer", "question").with_id(&request.question.id);
        return Err(ApiError::ValidationError("question content is empty".to_string())
            .to_response_with_context(context));
    }

    let verdict = verify_answer(&request.question, &request.user_answer);
    info!(
        question_id = %request.question.id,
        question_type = %request.question.question_type(),
        is_correct = verdict.is_correct,
        "Answer verified"
    );
    Ok(Json(ApiResponse::success(verdict)))
}

pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(json!({
        "status": "ok",
        "provider": state.llm_service.provider_name(),
        "model": state.llm_service.model_name(),
    })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Generation routes
        .route("/api/generate-plan", post(generate_plan))
        .route("/api/generate-questions", post(generate_questions))

        // Practice routes
        .route("/api/questions/verify", post(verify_question_answer))

        .route("/api/health", get(health))
        .with_state(state)
}
