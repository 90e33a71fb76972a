use serde::{Deserialize, Serialize};

use crate::models::{Question, QuestionBody};

/// What a learner submitted: one string, or a list for multiple choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmittedAnswer {
    One(String),
    Many(Vec<String>),
}

impl SubmittedAnswer {
    fn as_single(&self) -> String {
        match self {
            SubmittedAnswer::One(text) => text.clone(),
            SubmittedAnswer::Many(items) => items.join(", "),
        }
    }

    fn as_labels(&self) -> Vec<String> {
        match self {
            SubmittedAnswer::One(text) => split_answer_labels(text),
            SubmittedAnswer::Many(items) => items
                .iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_correct: bool,
    /// Only revealed when the submission was wrong.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    pub analysis: String,
}

const TRUE_WORDS: &[&str] = &["true", "t", "yes", "y", "1", "正确", "对", "是", "√"];
const FALSE_WORDS: &[&str] = &["false", "f", "no", "n", "0", "错误", "错", "否", "×"];

/// Split a multiple-choice answer such as `"A, C"`, `"A、C"` or `"AC"` into labels.
pub fn split_answer_labels(text: &str) -> Vec<String> {
    let parts: Vec<String> = text
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '，' | '、' | ';' | '；' | '/'))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();

    match parts.as_slice() {
        [run] if run.chars().count() > 1 && run.chars().all(|c| c.is_ascii_uppercase()) => {
            run.chars().map(String::from).collect()
        }
        _ => parts,
    }
}

fn option_label(index: usize) -> Option<char> {
    u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map(|i| char::from(b'A' + i))
}

/// Index of the option an answer refers to, by label (`B`, `b.`) or by text.
fn option_index(answer: &str, options: &[String]) -> Option<usize> {
    let trimmed = answer.trim();
    let label = trimmed.trim_end_matches(['.', ')', '）', '、', ':']);
    if label.chars().count() == 1 {
        let c = label.chars().next()?.to_ascii_uppercase();
        if let Some(index) = (0..options.len()).find(|i| option_label(*i) == Some(c)) {
            return Some(index);
        }
    }
    options
        .iter()
        .position(|option| option.trim().eq_ignore_ascii_case(trimmed))
}

fn canonical_choice(answer: &str, options: &[String]) -> String {
    option_index(answer, options)
        .and_then(option_label)
        .map(String::from)
        .unwrap_or_else(|| answer.trim().to_uppercase())
}

/// Exact, then trimmed, then case-insensitive.
fn loose_eq(submitted: &str, expected: &str) -> bool {
    submitted == expected
        || submitted.trim() == expected.trim()
        || submitted.trim().to_lowercase() == expected.trim().to_lowercase()
}

/// Lowercased with whitespace and punctuation removed.
fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_judgement(text: &str) -> Option<bool> {
    let word = text.trim().trim_end_matches(['.', '。', '!', '！']).to_lowercase();
    if TRUE_WORDS.contains(&word.as_str()) {
        Some(true)
    } else if FALSE_WORDS.contains(&word.as_str()) {
        Some(false)
    } else {
        None
    }
}

fn is_correct(body: &QuestionBody, submitted: &SubmittedAnswer) -> bool {
    match body {
        QuestionBody::MultipleChoice { options, answer } => {
            let canonical = |items: Vec<String>| {
                let mut labels: Vec<String> = items.iter().map(|item| canonical_choice(item, options)).collect();
                labels.sort();
                labels.dedup();
                labels
            };
            let expected = canonical(answer.clone());
            !expected.is_empty() && canonical(submitted.as_labels()) == expected
        }
        QuestionBody::SingleChoice { options, answer } => {
            let submitted = submitted.as_single();
            loose_eq(&submitted, answer)
                || matches!(
                    (option_index(&submitted, options), option_index(answer, options)),
                    (Some(a), Some(b)) if a == b
                )
        }
        QuestionBody::TrueFalse { answer } => {
            let submitted = submitted.as_single();
            match (parse_judgement(&submitted), parse_judgement(answer)) {
                (Some(a), Some(b)) => a == b,
                _ => !compact(answer).is_empty() && compact(&submitted) == compact(answer),
            }
        }
        QuestionBody::FillBlank { answer } => {
            let submitted = submitted.as_single();
            loose_eq(&submitted, answer) || (!compact(answer).is_empty() && compact(&submitted) == compact(answer))
        }
        QuestionBody::ShortAnswer { answer } => loose_eq(&submitted.as_single(), answer),
    }
}

/// Check a submission against a question's stored answer.
pub fn verify_answer(question: &Question, submitted: &SubmittedAnswer) -> Verdict {
    let correct = is_correct(&question.body, submitted);
    Verdict {
        is_correct: correct,
        correct_answer: if correct { None } else { Some(question.body.answer_text()) },
        analysis: question.analysis.clone(),
    }
}
