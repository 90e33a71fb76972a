pub mod api;
pub mod calendar;
pub mod config;
pub mod errors;
pub mod extractor;
pub mod grading;
pub mod llm_providers;
pub mod llm_service;
pub mod logging;
pub mod models;
pub mod progress;
pub mod prompts;
pub mod recovery;
pub mod repair;
pub mod validator;

pub use config::{Config, GenerationConfig, LLMConfig};
pub use errors::*;
pub use extractor::{extract_records, Candidate, ExtractionStage, PLAN_SCHEMA, QUESTION_SCHEMA};
pub use grading::{verify_answer, SubmittedAnswer, Verdict};
pub use llm_providers::{LLMProvider, LLMProviderFactory, LLMProviderType};
pub use llm_service::{GenerationError, LLMService};
pub use models::*;
pub use progress::{set_task_completed, PlanSummary};
pub use recovery::{recover_plan, recover_questions, PlanOutcome, QuestionOutcome};
