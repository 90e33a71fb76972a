use crate::config::GenerationConfig;
use crate::models::{truncate_chars, PlanRequest, QuestionRequest, QuestionType};

/// Rendered instructions. Every numeric constraint recovery enforces is
/// also spelled out to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

const PLAN_SYSTEM: &str =
    "You are an experienced study planner. Always respond with valid JSON in the requested format and nothing else.";

const QUESTION_SYSTEM: &str =
    "You are a university professor writing exam questions. Always respond with valid JSON in the requested format and nothing else.";

pub fn build_plan_prompt(request: &PlanRequest) -> Prompt {
    let subjects = request.subject_names().join(", ");
    let dates = request
        .valid_dates()
        .iter()
        .map(|date| date.format("%Y-%m-%d").to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let hours = request.daily_hours;

    let user = format!(
        r#"Create a day-by-day study plan.

Subjects: {subjects}
Plan period: {start} to {end} ({days} days)
Daily study time: {hours} hours

Valid dates (use only these):
{dates}

Respond with a JSON array only, no explanations or markdown, in this exact format:
[
  {{"date": "YYYY-MM-DD", "subject": "one of the subjects", "description": "what to study", "duration": 1.5}}
]

Rules:
- "date" must be one of the valid dates above
- "subject" must be exactly one of: {subjects}
- "duration" is in hours, in steps of 0.5
- For every date, the durations of that date's tasks must sum to exactly {hours} hours
- Cover every date and rotate subjects across the period"#,
        subjects = subjects,
        start = request.start_date,
        end = request.end_date,
        days = request.total_days(),
        hours = hours,
        dates = dates,
    );

    Prompt {
        system: PLAN_SYSTEM.to_string(),
        user,
    }
}

/// Split `count` evenly across `types`, giving the remainder to the first ones.
pub fn type_quotas(types: &[QuestionType], count: usize) -> Vec<(QuestionType, usize)> {
    if types.is_empty() {
        return Vec::new();
    }
    let base = count / types.len();
    let remainder = count % types.len();
    types
        .iter()
        .enumerate()
        .map(|(i, question_type)| (*question_type, base + usize::from(i < remainder)))
        .filter(|(_, quota)| *quota > 0)
        .collect()
}

fn answer_format(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::SingleChoice => {
            "4 option texts WITHOUT letter prefixes; \"answer\" is the letter of the correct option, e.g. \"B\""
        }
        QuestionType::MultipleChoice => {
            "4-5 option texts WITHOUT letter prefixes; \"answer\" is an array of the correct letters, e.g. [\"A\", \"C\"]"
        }
        QuestionType::TrueFalse => "no options; \"answer\" is \"true\" or \"false\"",
        QuestionType::FillBlank => "no options; mark the blank in \"content\" with ___ and put the missing text in \"answer\"",
        QuestionType::ShortAnswer => "no options; \"answer\" is a concise model answer",
    }
}

pub fn build_question_prompt(request: &QuestionRequest, limits: &GenerationConfig) -> Prompt {
    let count = request.question_count(limits);

    let quotas = type_quotas(&request.types, count)
        .into_iter()
        .map(|(question_type, quota)| {
            format!(
                "- {} x \"{}\" ({}): {}",
                quota,
                question_type.tag(),
                question_type.description(),
                answer_format(question_type)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut material = String::new();
    if let Some(course) = request.course_name.as_deref() {
        material.push_str(&format!("Course: {}\n", course));
    }
    if let Some(source) = request.source_text.as_deref() {
        material.push_str(&format!(
            "\nBase the questions on the following material:\n---\n{}\n---\n",
            truncate_chars(source, limits.prompt_source_chars)
        ));
    }

    let user = format!(
        r#"Generate {count} quiz questions.

{material}
Question types and how many of each:
{quotas}

Respond with a JSON object only, no explanations or markdown, in this exact format:
{{
  "questions": [
    {{
      "content": "Question text",
      "type": "choice",
      "options": ["Option 1", "Option 2", "Option 3", "Option 4"],
      "answer": "A",
      "analysis": "Why the answer is correct"
    }}
  ]
}}

Rules:
- "type" must be one of: choice, multiple, judge, fill, essay
- Omit "options" for judge, fill and essay questions
- Every question needs a non-empty "analysis"
- Questions must be answerable from the course or material above"#,
        count = count,
        material = material,
        quotas = quotas,
    );

    Prompt {
        system: QUESTION_SYSTEM.to_string(),
        user,
    }
}
