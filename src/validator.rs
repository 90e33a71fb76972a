use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::warn;

use crate::calendar::parse_plan_date;
use crate::config::GenerationConfig;
use crate::errors::RecoveryError;
use crate::extractor::Candidate;
use crate::grading::split_answer_labels;
use crate::log_pipeline_stage;
use crate::models::{PlanRequest, Question, QuestionBody, QuestionRequest, QuestionType, Task};

/// Records that survived normalization and how many were discarded.
///
/// Records still lacking their required text after aliasing and coercion are
/// dropped one by one; only a batch with nothing left is an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub dropped: usize,
}

const DESCRIPTION_KEYS: &[&str] = &["description", "task", "content", "title", "activity"];
const TASK_SUBJECT_KEYS: &[&str] = &["subject", "course", "topic"];
const DURATION_KEYS: &[&str] = &["duration", "hours", "time"];
const DATE_KEYS: &[&str] = &["date", "day"];

const CONTENT_KEYS: &[&str] = &["content", "question", "stem", "text", "title"];
const TYPE_KEYS: &[&str] = &["type", "question_type", "questionType", "kind"];
const OPTION_KEYS: &[&str] = &["options", "choices"];
const ANSWER_KEYS: &[&str] = &["answer", "correct_answer", "correctAnswer", "answers"];
const ANALYSIS_KEYS: &[&str] = &["analysis", "explanation", "rationale"];
const QUESTION_SUBJECT_KEYS: &[&str] = &["subject", "course"];

// ============================================================================
// Field access helpers
// ============================================================================

fn field<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

/// Scalar rendered as trimmed text; empty strings count as missing.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

fn text_field(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find_map(scalar_text)
}

/// Accepts `1.5`, `"1.5"` and `"1.5 hours"`.
fn number_field(record: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    match field(record, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let numeric: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            numeric.parse::<f64>().ok()
        }
        _ => None,
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Normalize plan candidates.
///
/// - subject: matched case-insensitively to a requested subject, defaulting to the first one
/// - description: defaults to `Study <subject>` when the model only named a subject
/// - duration: non-positive or missing values become the configured default
/// - date: kept when it is one of the plan's dates, otherwise the start date
///
/// A record with neither a description nor a subject carries nothing usable
/// and is dropped.
pub fn normalize_tasks(
    candidate: &Candidate,
    request: &PlanRequest,
    limits: &GenerationConfig,
) -> Result<Normalized<Task>, RecoveryError> {
    let subjects = request.subject_names();
    let mut tasks = Vec::with_capacity(candidate.records.len());
    let mut dropped = 0;

    for (index, record) in candidate.records.iter().enumerate() {
        let Some(object) = record.as_object() else {
            log_pipeline_stage!(dropped, "tasks", index = index, reason = "not an object");
            dropped += 1;
            continue;
        };

        let model_subject = text_field(object, TASK_SUBJECT_KEYS);
        let description = text_field(object, DESCRIPTION_KEYS);
        if model_subject.is_none() && description.is_none() {
            log_pipeline_stage!(dropped, "tasks", index = index, reason = "no description or subject");
            dropped += 1;
            continue;
        }

        let subject = canonical_subject(model_subject.as_deref(), &subjects);
        let description = description.unwrap_or_else(|| format!("Study {}", subject));

        let duration = number_field(object, DURATION_KEYS)
            .filter(|hours| hours.is_finite() && *hours > 0.0)
            .unwrap_or(limits.default_task_hours);

        let date = resolve_date(text_field(object, DATE_KEYS).as_deref(), request);

        tasks.push(Task {
            id: format!("task-{}", tasks.len() + 1),
            date,
            subject,
            description,
            duration,
            completed: false,
        });
    }

    if tasks.is_empty() {
        return Err(RecoveryError::EmptyResult {
            stage: candidate.stage,
            kind: "tasks",
            dropped,
        });
    }

    Ok(Normalized { records: tasks, dropped })
}

fn canonical_subject(model_subject: Option<&str>, requested: &[&str]) -> String {
    let fallback = requested.first().copied().unwrap_or("General");
    match model_subject {
        Some(name) => requested
            .iter()
            .find(|subject| subject.to_lowercase() == name.to_lowercase())
            .copied()
            .unwrap_or(name)
            .to_string(),
        None => fallback.to_string(),
    }
}

fn resolve_date(raw: Option<&str>, request: &PlanRequest) -> NaiveDate {
    raw.and_then(parse_plan_date)
        .filter(|date| request.contains_date(*date))
        .unwrap_or(request.start_date)
}

// ============================================================================
// Questions
// ============================================================================

enum RawAnswer {
    Missing,
    One(String),
    Many(Vec<String>),
}

fn answer_field(object: &Map<String, Value>) -> RawAnswer {
    match field(object, ANSWER_KEYS) {
        Some(Value::Array(items)) => {
            RawAnswer::Many(items.iter().filter_map(scalar_text).collect())
        }
        Some(value) => scalar_text(value).map(RawAnswer::One).unwrap_or(RawAnswer::Missing),
        None => RawAnswer::Missing,
    }
}

/// Options may arrive as strings, numbers, `{"text": ...}` objects, a
/// `{"A": ..., "B": ...}` map or a newline-separated string.
fn options_field(object: &Map<String, Value>) -> Vec<String> {
    match field(object, OPTION_KEYS) {
        Some(Value::Array(items)) => items.iter().filter_map(option_text).collect(),
        Some(Value::Object(map)) => map.values().filter_map(option_text).collect(),
        Some(Value::String(s)) => s
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn option_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => text_field(map, &["text", "content", "value", "label"]),
        other => scalar_text(other),
    }
}

/// Decide a type when the model gave none or an unknown one.
fn infer_type(answer: &RawAnswer, has_options: bool, request: &QuestionRequest) -> QuestionType {
    if matches!(answer, RawAnswer::Many(_)) && has_options {
        return QuestionType::MultipleChoice;
    }
    if has_options {
        return QuestionType::SingleChoice;
    }
    match request.types.as_slice() {
        [only] if !only.has_options() => *only,
        _ => QuestionType::ShortAnswer,
    }
}

fn single_answer(answer: RawAnswer) -> String {
    match answer {
        RawAnswer::Missing => String::new(),
        RawAnswer::One(text) => text,
        RawAnswer::Many(items) => items.join(", "),
    }
}

fn build_body(question_type: QuestionType, options: Vec<String>, answer: RawAnswer) -> QuestionBody {
    match question_type {
        QuestionType::SingleChoice => QuestionBody::SingleChoice {
            options,
            answer: match answer {
                RawAnswer::Many(mut items) if !items.is_empty() => items.swap_remove(0),
                other => single_answer(other),
            },
        },
        QuestionType::MultipleChoice => QuestionBody::MultipleChoice {
            options,
            answer: match answer {
                RawAnswer::Missing => Vec::new(),
                RawAnswer::One(text) => split_answer_labels(&text),
                RawAnswer::Many(items) => items,
            },
        },
        QuestionType::TrueFalse => QuestionBody::TrueFalse { answer: single_answer(answer) },
        QuestionType::FillBlank => QuestionBody::FillBlank { answer: single_answer(answer) },
        QuestionType::ShortAnswer => QuestionBody::ShortAnswer { answer: single_answer(answer) },
    }
}

/// Normalize quiz candidates. Questions without content are dropped; a
/// choice question that arrived without options is kept as a short-answer
/// question so option-bearing variants always carry options.
pub fn normalize_questions(
    candidate: &Candidate,
    request: &QuestionRequest,
) -> Result<Normalized<Question>, RecoveryError> {
    let default_subject = request.default_subject();
    let mut questions = Vec::with_capacity(candidate.records.len());
    let mut dropped = 0;

    for (index, record) in candidate.records.iter().enumerate() {
        let Some(object) = record.as_object() else {
            log_pipeline_stage!(dropped, "questions", index = index, reason = "not an object");
            dropped += 1;
            continue;
        };

        let Some(content) = text_field(object, CONTENT_KEYS) else {
            log_pipeline_stage!(dropped, "questions", index = index, reason = "empty content");
            dropped += 1;
            continue;
        };

        let options = options_field(object);
        let answer = answer_field(object);

        let declared = text_field(object, TYPE_KEYS).and_then(|tag| tag.parse::<QuestionType>().ok());
        let mut question_type = declared.unwrap_or_else(|| infer_type(&answer, !options.is_empty(), request));

        if question_type.has_options() && options.is_empty() {
            warn!(
                component = "recovery",
                record_index = index,
                declared_type = %question_type,
                "Choice question has no options, keeping it as a short-answer question"
            );
            question_type = QuestionType::ShortAnswer;
        }

        let options = if question_type.has_options() { options } else { Vec::new() };

        questions.push(Question {
            id: format!("q-{}", questions.len() + 1),
            content,
            body: build_body(question_type, options, answer),
            analysis: text_field(object, ANALYSIS_KEYS).unwrap_or_default(),
            subject: text_field(object, QUESTION_SUBJECT_KEYS).unwrap_or_else(|| default_subject.clone()),
        });
    }

    if questions.is_empty() {
        return Err(RecoveryError::EmptyResult {
            stage: candidate.stage,
            kind: "questions",
            dropped,
        });
    }

    Ok(Normalized { records: questions, dropped })
}
