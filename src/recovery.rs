use chrono::NaiveDate;
use serde::Serialize;
use std::time::Instant;

use crate::config::GenerationConfig;
use crate::errors::RecoveryError;
use crate::extractor::{extract_records, ExtractionStage, PLAN_SCHEMA, QUESTION_SCHEMA};
use crate::models::{PlanRequest, Question, QuestionRequest, Task};
use crate::progress::PlanSummary;
use crate::repair::enforce_daily_hours;
use crate::validator::{normalize_questions, normalize_tasks};
use crate::log_performance;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutcome {
    pub tasks: Vec<Task>,
    pub summary: PlanSummary,
    pub stage: ExtractionStage,
    pub rescaled_days: Vec<NaiveDate>,
    pub dropped_records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOutcome {
    pub questions: Vec<Question>,
    pub stage: ExtractionStage,
    pub dropped_records: usize,
}

/// Extract, normalize and repair a plan from raw completion text.
///
/// Fails with a typed [`RecoveryError`] when no structure is found, nothing
/// survives validation or a day cannot be rescaled. Never retries.
pub fn recover_plan(
    request: &PlanRequest,
    response: &str,
    limits: &GenerationConfig,
) -> Result<PlanOutcome, RecoveryError> {
    let started = Instant::now();
    request.validate(limits)?;

    let candidate = extract_records(response, &PLAN_SCHEMA)?;
    let normalized = normalize_tasks(&candidate, request, limits)?;

    let mut tasks = normalized.records;
    let report = enforce_daily_hours(&mut tasks, request.daily_hours, limits.duration_tolerance)?;
    let summary = PlanSummary::from_tasks(&tasks);

    log_performance!("recover_plan", duration_ms = started.elapsed().as_millis() as u64);

    Ok(PlanOutcome {
        tasks,
        summary,
        stage: candidate.stage,
        rescaled_days: report.rescaled_days,
        dropped_records: normalized.dropped,
    })
}

pub fn recover_questions(request: &QuestionRequest, response: &str) -> Result<QuestionOutcome, RecoveryError> {
    let started = Instant::now();
    request.validate()?;

    let candidate = extract_records(response, &QUESTION_SCHEMA)?;
    let normalized = normalize_questions(&candidate, request)?;

    log_performance!("recover_questions", duration_ms = started.elapsed().as_millis() as u64);

    Ok(QuestionOutcome {
        questions: normalized.records,
        stage: candidate.stage,
        dropped_records: normalized.dropped,
    })
}
