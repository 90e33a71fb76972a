use crate::api::ApiResponse;
use crate::extractor::ExtractionStage;
use axum::{http::StatusCode, response::Json};
use chrono::NaiveDate;
use std::fmt;
use tracing::{error, info, warn};

/// Why one stage of the extraction cascade gave up.
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub stage: ExtractionStage,
    pub reason: String,
}

impl StageFailure {
    pub fn new(stage: ExtractionStage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.reason)
    }
}

fn join_failures(attempts: &[StageFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Terminal outcomes of the recovery pipeline for a single request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecoveryError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No structured records could be recovered ({})", join_failures(.attempts))]
    RecoveryFailed { attempts: Vec<StageFailure> },

    #[error("No {kind} survived validation after {stage} extraction ({dropped} dropped)")]
    EmptyResult {
        stage: ExtractionStage,
        kind: &'static str,
        dropped: usize,
    },

    #[error("Cannot rescale tasks on {date}: durations sum to {actual}")]
    ConstraintUnsatisfiable { date: NaiveDate, actual: f64 },
}

impl RecoveryError {
    /// Short machine-readable tag used in logs and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            RecoveryError::InvalidRequest(_) => "invalid_request",
            RecoveryError::RecoveryFailed { .. } => "recovery_failed",
            RecoveryError::EmptyResult { .. } => "empty_result",
            RecoveryError::ConstraintUnsatisfiable { .. } => "constraint_unsatisfiable",
        }
    }
}

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("LLM service error: {0}")]
    LLMError(String),
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub request_id: Option<String>,
    pub resource_type: String,
    pub user_friendly_message: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            request_id: None,
            resource_type: resource_type.to_string(),
            user_friendly_message: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.request_id = Some(id.to_string());
        self
    }

    pub fn with_user_message(mut self, message: &str) -> Self {
        self.user_friendly_message = Some(message.to_string());
        self
    }
}

impl ApiError {
    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(
        self,
        context: ErrorContext,
    ) -> (StatusCode, Json<ApiResponse<()>>) {
        match &self {
            ApiError::ValidationError(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    request_id = ?context.request_id,
                    error = %self,
                    "Validation error"
                );
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error(self.to_string())),
                )
            }
            ApiError::GenerationFailed(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    request_id = ?context.request_id,
                    error = %self,
                    "Model output could not be recovered"
                );
                (
                    StatusCode::BAD_GATEWAY,
                    Json(ApiResponse::error(context.user_friendly_message.unwrap_or_else(
                        || format!("Failed to generate {}, please retry.", context.resource_type),
                    ))),
                )
            }
            ApiError::ConstraintViolation(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    request_id = ?context.request_id,
                    error = %self,
                    "Generated data violates a hard constraint"
                );
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ApiResponse::error(self.to_string())),
                )
            }
            ApiError::LLMError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    request_id = ?context.request_id,
                    error = %self,
                    "LLM service error"
                );
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ApiResponse::error(
                        "AI service temporarily unavailable. Please try again.".to_string(),
                    )),
                )
            }
        }
    }
}

impl From<RecoveryError> for ApiError {
    fn from(err: RecoveryError) -> Self {
        match err {
            RecoveryError::InvalidRequest(message) => ApiError::ValidationError(message),
            RecoveryError::ConstraintUnsatisfiable { .. } => {
                ApiError::ConstraintViolation(err.to_string())
            }
            RecoveryError::RecoveryFailed { .. } | RecoveryError::EmptyResult { .. } => {
                info!(kind = err.kind(), "Classifying recovery error as generation failure");
                ApiError::GenerationFailed(err.to_string())
            }
        }
    }
}
