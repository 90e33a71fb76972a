use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::errors::{RecoveryError, StageFailure};
use crate::log_pipeline_stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStage {
    Direct,
    Fenced,
    Repaired,
    Salvage,
}

impl ExtractionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStage::Direct => "direct",
            ExtractionStage::Fenced => "fenced",
            ExtractionStage::Repaired => "repaired",
            ExtractionStage::Salvage => "salvage",
        }
    }
}

impl fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a salvaged field's raw value is matched in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldShape {
    /// `"name": "text"`
    Text,
    /// `"name": 1.5` (quotes tolerated)
    Number,
    /// `"name": [...]`
    List,
    /// `"name": "text"` or `"name": [...]`
    TextOrList,
}

#[derive(Debug, Clone, Copy)]
pub struct SalvageField {
    pub name: &'static str,
    pub shape: FieldShape,
}

/// Describes the records one pipeline expects from the model.
#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    /// Plural record name, used in logs and errors.
    pub name: &'static str,
    /// Keys under which a wrapping object may hold the record array.
    pub wrapper_keys: &'static [&'static str],
    /// Field whose salvage matches decide how many records are manufactured.
    pub primary_field: &'static str,
    /// Fields scanned during salvage, primary field first.
    pub salvage_fields: &'static [SalvageField],
}

pub const PLAN_SCHEMA: RecordSchema = RecordSchema {
    name: "tasks",
    wrapper_keys: &["tasks", "plan", "schedule", "data", "items"],
    primary_field: "subject",
    salvage_fields: &[
        SalvageField { name: "subject", shape: FieldShape::Text },
        SalvageField { name: "description", shape: FieldShape::Text },
        SalvageField { name: "date", shape: FieldShape::Text },
        SalvageField { name: "duration", shape: FieldShape::Number },
    ],
};

pub const QUESTION_SCHEMA: RecordSchema = RecordSchema {
    name: "questions",
    wrapper_keys: &["questions", "data", "items", "quiz"],
    primary_field: "content",
    salvage_fields: &[
        SalvageField { name: "content", shape: FieldShape::Text },
        SalvageField { name: "type", shape: FieldShape::Text },
        SalvageField { name: "answer", shape: FieldShape::TextOrList },
        SalvageField { name: "options", shape: FieldShape::List },
        SalvageField { name: "analysis", shape: FieldShape::Text },
    ],
};

/// Records pulled out of a response, with the strategy that found them.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub records: Vec<Value>,
    pub stage: ExtractionStage,
}

type Strategy = fn(&str, &RecordSchema) -> Result<Vec<Value>, String>;

const CASCADE: [(ExtractionStage, Strategy); 4] = [
    (ExtractionStage::Direct, parse_direct),
    (ExtractionStage::Fenced, parse_fenced),
    (ExtractionStage::Repaired, parse_repaired),
    (ExtractionStage::Salvage, salvage_fields),
];

/// Run the cascade over `response`, returning the first non-empty candidate.
///
/// Strategies run in order: `direct` parses the whole text, `fenced` a code
/// block or the first balanced span, `repaired` the best-guess span after
/// comment, trailing-comma and bare-key repair, and `salvage` reassembles
/// per-field regex matches positionally. Only when all of them fail does the
/// caller see `RecoveryFailed`.
pub fn extract_records(response: &str, schema: &RecordSchema) -> Result<Candidate, RecoveryError> {
    let mut attempts = Vec::with_capacity(CASCADE.len());

    for (stage, strategy) in CASCADE {
        match strategy(response, schema) {
            Ok(records) => {
                log_pipeline_stage!(success, schema.name, stage, records = records.len());
                return Ok(Candidate { records, stage });
            }
            Err(reason) => {
                log_pipeline_stage!(failure, schema.name, stage, reason = reason);
                attempts.push(StageFailure::new(stage, reason));
            }
        }
    }

    Err(RecoveryError::RecoveryFailed { attempts })
}

// ============================================================================
// Shape check
// ============================================================================

/// Accepts an array of objects, or an object wrapping one under a known key.
/// A lone object carrying the primary field counts as a one-record batch.
pub fn unwrap_records(value: Value, schema: &RecordSchema) -> Result<Vec<Value>, String> {
    unwrap_records_at_depth(value, schema, 0)
}

fn unwrap_records_at_depth(value: Value, schema: &RecordSchema, depth: usize) -> Result<Vec<Value>, String> {
    match value {
        Value::Array(items) => {
            let total = items.len();
            let records: Vec<Value> = items.into_iter().filter(Value::is_object).collect();
            if records.is_empty() {
                Err(format!("array of {} elements holds no objects", total))
            } else {
                Ok(records)
            }
        }
        Value::Object(mut object) => {
            for key in schema.wrapper_keys {
                if let Some(inner) = object.remove(*key) {
                    if inner.is_array() || inner.is_object() {
                        return unwrap_records_at_depth(inner, schema, depth + 1);
                    }
                }
            }
            if object.contains_key(schema.primary_field) {
                return Ok(vec![Value::Object(object)]);
            }
            if depth == 0 {
                // One level of unknown nesting, e.g. {"result": {"tasks": [...]}}
                for (_, inner) in object {
                    if inner.is_object() {
                        if let Ok(records) = unwrap_records_at_depth(inner, schema, depth + 1) {
                            return Ok(records);
                        }
                    }
                }
            }
            Err(format!(
                "object has none of the keys {:?} and no \"{}\" field",
                schema.wrapper_keys, schema.primary_field
            ))
        }
        other => Err(format!("expected an array or object, found {}", json_kind(&other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_and_unwrap(text: &str, schema: &RecordSchema) -> Result<Vec<Value>, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    unwrap_records(value, schema)
}

/// Try each span in order; report the last failure when none parses.
fn first_parsable<I>(spans: I, schema: &RecordSchema, transform: fn(&str) -> String) -> Result<Vec<Value>, String>
where
    I: IntoIterator<Item = String>,
{
    let mut last_error = None;
    for span in spans {
        match parse_and_unwrap(&transform(&span), schema) {
            Ok(records) => return Ok(records),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| "no fenced block or bracketed span found".to_string()))
}

// ============================================================================
// Stage 1: direct parse
// ============================================================================

fn parse_direct(response: &str, schema: &RecordSchema) -> Result<Vec<Value>, String> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err("response is empty".to_string());
    }
    parse_and_unwrap(trimmed, schema)
}

// ============================================================================
// Stage 2: fenced block or balanced span
// ============================================================================

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("valid fence regex"))
}

/// Bodies of every complete fenced code block, in order of appearance.
pub fn fenced_blocks(text: &str) -> Vec<String> {
    fence_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|body| body.as_str().trim().to_string())
        .filter(|body| !body.is_empty())
        .collect()
}

/// The balanced span opened by the first `open` character, ignoring brackets
/// inside string literals.
pub fn balanced_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// The balanced span opened by whichever of `[` or `{` appears first.
pub fn first_balanced_span(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let (open, close) = if text[start..].starts_with('[') { ('[', ']') } else { ('{', '}') };
    balanced_span(&text[start..], open, close)
}

/// Fenced blocks when the text has any, otherwise the first balanced span.
fn structured_spans(text: &str) -> Vec<String> {
    let blocks = fenced_blocks(text);
    if !blocks.is_empty() {
        return blocks;
    }
    first_balanced_span(text).map(str::to_string).into_iter().collect()
}

fn parse_fenced(response: &str, schema: &RecordSchema) -> Result<Vec<Value>, String> {
    first_parsable(structured_spans(response), schema, |span| span.to_string())
}

// ============================================================================
// Stage 3: syntax repair
// ============================================================================

fn trailing_comma_regex() -> &'static Regex {
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    TRAILING.get_or_init(|| Regex::new(r",(\s*[}\]])").expect("valid trailing comma regex"))
}

fn bare_key_regex() -> &'static Regex {
    static BARE_KEY: OnceLock<Regex> = OnceLock::new();
    BARE_KEY.get_or_init(|| {
        Regex::new(r"([{,]\s*)([A-Za-z0-9_]+)(\s*:)").expect("valid bare key regex")
    })
}

fn line_comment_regex() -> &'static Regex {
    static COMMENT: OnceLock<Regex> = OnceLock::new();
    COMMENT.get_or_init(|| Regex::new(r"(?m)//.*$").expect("valid comment regex"))
}

/// Apply `f` to every stretch of `text` that lies outside a double-quoted
/// string literal, leaving string contents untouched.
fn map_outside_strings(text: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut segment_start = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escape_next {
                escape_next = false;
            } else if c == '\\' {
                escape_next = true;
            } else if c == '"' {
                in_string = false;
                out.push_str(&text[segment_start..=i]);
                segment_start = i + 1;
            }
        } else if c == '"' {
            out.push_str(&f(&text[segment_start..i]));
            in_string = true;
            segment_start = i;
        }
    }

    if in_string {
        out.push_str(&text[segment_start..]);
    } else {
        out.push_str(&f(&text[segment_start..]));
    }
    out
}

/// The bounded repair sequence: drop fences and surrounding prose, strip
/// `//` comments, remove trailing commas, quote bare keys.
pub fn repair_json(span: &str) -> String {
    let unfenced = span.replace("```json", "").replace("```JSON", "").replace("```", "");
    let body = trim_to_structure(unfenced.trim());

    let without_comments = map_outside_strings(body, |segment| {
        line_comment_regex().replace_all(segment, "").into_owned()
    });
    let without_trailing = map_outside_strings(&without_comments, |segment| {
        trailing_comma_regex().replace_all(segment, "$1").into_owned()
    });
    map_outside_strings(&without_trailing, |segment| {
        bare_key_regex().replace_all(segment, "$1\"$2\"$3").into_owned()
    })
}

/// Cut leading prose before the first opener and trailing text after the
/// last closer.
fn trim_to_structure(text: &str) -> &str {
    let start = text.find(['[', '{']);
    let end = text.rfind([']', '}']);
    match (start, end) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        (Some(start), _) => &text[start..],
        _ => text,
    }
}

fn parse_repaired(response: &str, schema: &RecordSchema) -> Result<Vec<Value>, String> {
    if !response.contains(['[', '{']) {
        return Err("no bracket or brace to repair".to_string());
    }
    let mut spans = structured_spans(response);
    let whole = response.trim().to_string();
    if !spans.contains(&whole) {
        spans.push(whole);
    }
    first_parsable(spans, schema, repair_json)
}

// ============================================================================
// Stage 4: field salvage
// ============================================================================

fn field_pattern(field: &SalvageField) -> String {
    let key = regex::escape(field.name);
    let text = r#""((?:[^"\\]|\\.)+)""#;
    match field.shape {
        FieldShape::Text => format!(r#""{}"\s*:\s*{}"#, key, text),
        FieldShape::Number => format!(r#""{}"\s*:\s*"?(-?\d+(?:\.\d+)?)"?"#, key),
        FieldShape::List => format!(r#""{}"\s*:\s*(\[[^\]]*\])"#, key),
        FieldShape::TextOrList => format!(r#""{}"\s*:\s*(\[[^\]]*\]|"(?:[^"\\]|\\.)+")"#, key),
    }
}

/// Compiled salvage patterns, keyed by field name and shape.
fn salvage_regex(field: &SalvageField) -> Result<Regex, String> {
    static PATTERNS: OnceLock<Mutex<HashMap<(&'static str, FieldShape), Regex>>> = OnceLock::new();
    let mut patterns = PATTERNS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(pattern) = patterns.get(&(field.name, field.shape)) {
        return Ok(pattern.clone());
    }
    let pattern = Regex::new(&field_pattern(field)).map_err(|e| e.to_string())?;
    patterns.insert((field.name, field.shape), pattern.clone());
    Ok(pattern)
}

fn unescape_json_text(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

fn parse_list(raw: &str) -> Value {
    serde_json::from_str::<Value>(raw)
        .or_else(|_| serde_json::from_str::<Value>(&repair_json(raw)))
        .ok()
        .filter(Value::is_array)
        .unwrap_or_else(|| Value::Array(Vec::new()))
}

fn salvage_value(field: &SalvageField, raw: &str) -> Value {
    match field.shape {
        FieldShape::Text => Value::String(unescape_json_text(raw)),
        FieldShape::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        FieldShape::List => parse_list(raw),
        FieldShape::TextOrList => {
            if raw.starts_with('[') {
                match serde_json::from_str::<Value>(raw) {
                    Ok(list @ Value::Array(_)) => list,
                    _ => Value::String(raw.trim_matches(['[', ']']).trim().to_string()),
                }
            } else {
                let inner = raw
                    .strip_prefix('"')
                    .and_then(|text| text.strip_suffix('"'))
                    .unwrap_or(raw);
                Value::String(unescape_json_text(inner))
            }
        }
    }
}

/// Scan each field independently and pair the i-th match of every field with
/// the i-th match of the primary field. Misaligns when a field is missing
/// from an early record; that is accepted best-effort behaviour.
fn salvage_fields(response: &str, schema: &RecordSchema) -> Result<Vec<Value>, String> {
    let mut columns: Vec<(&SalvageField, Vec<Value>)> = Vec::with_capacity(schema.salvage_fields.len());

    for field in schema.salvage_fields {
        let pattern = salvage_regex(field)?;
        let values = pattern
            .captures_iter(response)
            .filter_map(|caps| caps.get(1))
            .map(|raw| salvage_value(field, raw.as_str()))
            .collect();
        columns.push((field, values));
    }

    let primary_count = columns
        .iter()
        .find(|(field, _)| field.name == schema.primary_field)
        .map(|(_, values)| values.len())
        .unwrap_or(0);

    if primary_count == 0 {
        return Err(format!("no \"{}\" fields found", schema.primary_field));
    }

    let records = (0..primary_count)
        .map(|index| {
            let mut record = Map::new();
            for (field, values) in &columns {
                if let Some(value) = values.get(index) {
                    record.insert(field.name.to_string(), value.clone());
                }
            }
            Value::Object(record)
        })
        .collect();

    Ok(records)
}
