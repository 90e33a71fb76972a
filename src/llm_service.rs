use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{GenerationConfig, LLMConfig};
use crate::errors::{ApiError, RecoveryError};
use crate::llm_providers::{LLMProvider, LLMProviderFactory};
use crate::models::{PlanRequest, QuestionRequest};
use crate::prompts::{build_plan_prompt, build_question_prompt, Prompt};
use crate::recovery::{recover_plan, recover_questions, PlanOutcome, QuestionOutcome};

// Import logging macros
use crate::{log_llm_operation, log_validation};

/// Why a generation request produced no records.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error("LLM provider request failed: {0:#}")]
    Provider(#[from] anyhow::Error),
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Recovery(recovery) => ApiError::from(recovery),
            GenerationError::Provider(provider) => ApiError::LLMError(format!("{:#}", provider)),
        }
    }
}

#[derive(Clone)]
pub struct LLMService {
    provider: LLMProvider,
    generation: GenerationConfig,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl LLMService {
    pub fn new(llm: &LLMConfig, generation: GenerationConfig) -> Result<Self> {
        let provider = LLMProviderFactory::create_provider(llm)?;
        Ok(Self {
            provider,
            generation,
            max_attempts: llm.max_attempts.max(1),
            retry_backoff: Duration::from_millis(llm.retry_backoff_ms),
        })
    }

    /// Get the provider name for logging and testing
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Get the model name being used
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn generation_config(&self) -> &GenerationConfig {
        &self.generation
    }

    /// Call the provider, retrying failed requests with linear backoff.
    /// Only transport/provider failures are retried; unusable text is not.
    async fn complete(&self, operation: &str, prompt: &Prompt) -> Result<String> {
        let mut attempt = 1;
        loop {
            log_llm_operation!(
                start,
                operation,
                provider = self.provider_name(),
                prompt_length = prompt.user.len()
            );
            let started = Instant::now();

            match self.provider.make_request(Some(&prompt.system), &prompt.user).await {
                Ok(text) => {
                    log_llm_operation!(
                        success,
                        operation,
                        provider = self.provider_name(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        response_length = text.len()
                    );
                    return Ok(text);
                }
                Err(e) if attempt < self.max_attempts => {
                    log_llm_operation!(
                        error,
                        operation,
                        provider = self.provider_name(),
                        error = e,
                        retry_count = attempt
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    log_llm_operation!(
                        error,
                        operation,
                        provider = self.provider_name(),
                        error = e,
                        retry_count = attempt
                    );
                    return Err(e.context(format!("{} failed after {} attempt(s)", operation, attempt)));
                }
            }
        }
    }

    pub async fn generate_study_plan(&self, request: &PlanRequest) -> Result<PlanOutcome, GenerationError> {
        request
            .validate(&self.generation)
            .inspect_err(|e| {
                log_validation!(failure, "plan_request", error = e);
            })?;

        info!(
            subjects = ?request.subject_names(),
            start_date = %request.start_date,
            end_date = %request.end_date,
            daily_hours = request.daily_hours,
            total_days = request.total_days(),
            "Generating study plan"
        );

        let prompt = build_plan_prompt(request);
        let response_text = self.complete("generate_study_plan", &prompt).await?;
        debug!(response_content = %response_text, "Raw LLM response for study plan");

        let outcome = recover_plan(request, &response_text, &self.generation)?;

        info!(
            task_count = outcome.tasks.len(),
            stage = %outcome.stage,
            dropped = outcome.dropped_records,
            rescaled_days = outcome.rescaled_days.len(),
            "Successfully generated study plan"
        );
        Ok(outcome)
    }

    /// Normalizes the request (type dedupe, source bounds) before prompting.
    pub async fn generate_questions(&self, request: &QuestionRequest) -> Result<QuestionOutcome, GenerationError> {
        let request = request.clone().normalized(&self.generation);
        request
            .validate()
            .inspect_err(|e| {
                log_validation!(failure, "question_request", error = e);
            })?;

        info!(
            course_name = ?request.course_name,
            types = ?request.types,
            source_length = request.source_text.as_deref().map(|s| s.chars().count()).unwrap_or(0),
            question_count = request.question_count(&self.generation),
            "Generating quiz questions"
        );

        let prompt = build_question_prompt(&request, &self.generation);
        let response_text = self.complete("generate_questions", &prompt).await?;
        debug!(response_content = %response_text, "Raw LLM response for quiz generation");

        let outcome = recover_questions(&request, &response_text)?;

        info!(
            question_count = outcome.questions.len(),
            stage = %outcome.stage,
            dropped = outcome.dropped_records,
            "Successfully generated quiz questions"
        );
        Ok(outcome)
    }
}
