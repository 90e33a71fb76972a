use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::calendar;
use crate::config::GenerationConfig;
use crate::errors::RecoveryError;

/// One unit of a generated study plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String, // task-<n>, unique within a plan
    pub date: NaiveDate,
    pub subject: String,
    pub description: String,
    pub duration: f64, // hours
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum QuestionType {
    #[serde(rename = "choice")]
    SingleChoice,
    #[serde(rename = "multiple")]
    MultipleChoice,
    #[serde(rename = "judge")]
    TrueFalse,
    #[serde(rename = "fill")]
    FillBlank,
    #[serde(rename = "essay")]
    ShortAnswer,
}

impl QuestionType {
    pub const ALL: [QuestionType; 5] = [
        QuestionType::SingleChoice,
        QuestionType::MultipleChoice,
        QuestionType::TrueFalse,
        QuestionType::FillBlank,
        QuestionType::ShortAnswer,
    ];

    /// Wire tag, as used in requests and in the JSON the model is asked for.
    pub fn tag(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "choice",
            QuestionType::MultipleChoice => "multiple",
            QuestionType::TrueFalse => "judge",
            QuestionType::FillBlank => "fill",
            QuestionType::ShortAnswer => "essay",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single-choice",
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::TrueFalse => "true/false",
            QuestionType::FillBlank => "fill-in-the-blank",
            QuestionType::ShortAnswer => "short-answer",
        }
    }

    pub fn has_options(&self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultipleChoice)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    /// Lenient parse: accepts the wire tags plus the spellings models tend to produce.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' ', '/'], "_");
        match normalized.as_str() {
            "choice" | "single" | "single_choice" | "singlechoice"
            | "radio" | "单选" | "单选题" | "选择题" => Ok(QuestionType::SingleChoice),
            "multiple" | "multi" | "multiple_choice" | "multiplechoice" | "multi_choice"
            | "checkbox" | "多选" | "多选题" => Ok(QuestionType::MultipleChoice),
            "judge" | "true_false" | "truefalse" | "boolean" | "tf" | "判断" | "判断题" => {
                Ok(QuestionType::TrueFalse)
            }
            "fill" | "fill_blank" | "fill_in_blank" | "fill_in_the_blank" | "blank" | "填空"
            | "填空题" => Ok(QuestionType::FillBlank),
            "essay" | "short_answer" | "shortanswer" | "open" | "简答" | "简答题" => {
                Ok(QuestionType::ShortAnswer)
            }
            _ => Err(format!("unknown question type '{}'", s)),
        }
    }
}

impl TryFrom<String> for QuestionType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Type-specific part of a question. Option-bearing kinds carry their options;
/// the others cannot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QuestionBody {
    #[serde(rename = "choice")]
    SingleChoice { options: Vec<String>, answer: String },
    #[serde(rename = "multiple")]
    MultipleChoice {
        options: Vec<String>,
        answer: Vec<String>,
    },
    #[serde(rename = "judge")]
    TrueFalse { answer: String },
    #[serde(rename = "fill")]
    FillBlank { answer: String },
    #[serde(rename = "essay")]
    ShortAnswer { answer: String },
}

impl QuestionBody {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionBody::SingleChoice { .. } => QuestionType::SingleChoice,
            QuestionBody::MultipleChoice { .. } => QuestionType::MultipleChoice,
            QuestionBody::TrueFalse { .. } => QuestionType::TrueFalse,
            QuestionBody::FillBlank { .. } => QuestionType::FillBlank,
            QuestionBody::ShortAnswer { .. } => QuestionType::ShortAnswer,
        }
    }

    pub fn options(&self) -> Option<&[String]> {
        match self {
            QuestionBody::SingleChoice { options, .. }
            | QuestionBody::MultipleChoice { options, .. } => Some(options),
            _ => None,
        }
    }

    /// Human-readable rendering of the expected answer.
    pub fn answer_text(&self) -> String {
        match self {
            QuestionBody::MultipleChoice { answer, .. } => answer.join(", "),
            QuestionBody::SingleChoice { answer, .. }
            | QuestionBody::TrueFalse { answer }
            | QuestionBody::FillBlank { answer }
            | QuestionBody::ShortAnswer { answer } => answer.clone(),
        }
    }
}

/// One unit of a generated quiz batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub content: String,
    #[serde(flatten)]
    pub body: QuestionBody,
    #[serde(default)]
    pub analysis: String,
    pub subject: String,
}

impl Question {
    pub fn question_type(&self) -> QuestionType {
        self.body.question_type()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub subjects: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub daily_hours: f64,
}

/// Upper bound on `dailyHours`; a day has no more hours than this.
pub const MAX_DAILY_HOURS: f64 = 24.0;

impl PlanRequest {
    pub fn validate(&self, limits: &GenerationConfig) -> Result<(), RecoveryError> {
        if self.subjects.iter().all(|s| s.trim().is_empty()) {
            return Err(RecoveryError::InvalidRequest(
                "at least one subject is required".to_string(),
            ));
        }
        if self.end_date < self.start_date {
            return Err(RecoveryError::InvalidRequest(format!(
                "end date {} is before start date {}",
                self.end_date, self.start_date
            )));
        }
        if !self.daily_hours.is_finite() || self.daily_hours <= 0.0 {
            return Err(RecoveryError::InvalidRequest(format!(
                "daily hours must be positive, got {}",
                self.daily_hours
            )));
        }
        if self.daily_hours > MAX_DAILY_HOURS {
            return Err(RecoveryError::InvalidRequest(format!(
                "daily hours must be at most {}, got {}",
                MAX_DAILY_HOURS, self.daily_hours
            )));
        }
        if self.total_days() > limits.max_plan_days {
            return Err(RecoveryError::InvalidRequest(format!(
                "plan spans {} days, the limit is {}",
                self.total_days(),
                limits.max_plan_days
            )));
        }
        Ok(())
    }

    /// Subjects with blanks removed, in request order.
    pub fn subject_names(&self) -> Vec<&str> {
        self.subjects
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn total_days(&self) -> i64 {
        calendar::inclusive_day_count(self.start_date, self.end_date)
    }

    pub fn valid_dates(&self) -> Vec<NaiveDate> {
        calendar::dates_between(self.start_date, self.end_date)
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRequest {
    #[serde(default)]
    pub course_name: Option<String>,
    pub types: Vec<QuestionType>,
    #[serde(default)]
    pub source_text: Option<String>,
}

impl QuestionRequest {
    /// Trims the course name, drops duplicate types and bounds the source text
    /// to the upload limit. JSON sources are pretty-printed first.
    pub fn normalized(self, limits: &GenerationConfig) -> Self {
        let course_name = self
            .course_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let mut types = Vec::with_capacity(self.types.len());
        for question_type in self.types {
            if !types.contains(&question_type) {
                types.push(question_type);
            }
        }

        let source_text = self
            .source_text
            .map(|text| {
                let text = match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(value) if value.is_object() || value.is_array() => {
                        serde_json::to_string_pretty(&value).unwrap_or(text)
                    }
                    _ => text,
                };
                truncate_chars(&text, limits.max_source_chars)
            })
            .filter(|text| !text.trim().is_empty());

        Self {
            course_name,
            types,
            source_text,
        }
    }

    pub fn validate(&self) -> Result<(), RecoveryError> {
        if self.types.is_empty() {
            return Err(RecoveryError::InvalidRequest(
                "select at least one question type".to_string(),
            ));
        }
        let has_course = self
            .course_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty());
        let has_source = self
            .source_text
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty());
        if !has_course && !has_source {
            return Err(RecoveryError::InvalidRequest(
                "provide a course name or source text".to_string(),
            ));
        }
        Ok(())
    }

    /// `min(per_type × distinct types, cap)`
    pub fn question_count(&self, limits: &GenerationConfig) -> usize {
        let mut distinct: Vec<QuestionType> = Vec::new();
        for question_type in &self.types {
            if !distinct.contains(question_type) {
                distinct.push(*question_type);
            }
        }
        (limits.questions_per_type * distinct.len()).min(limits.max_questions)
    }

    /// Subject stamped on questions the model left without one.
    pub fn default_subject(&self) -> String {
        self.course_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_QUESTION_SUBJECT)
            .to_string()
    }
}

pub const DEFAULT_QUESTION_SUBJECT: &str = "Custom question bank";

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
