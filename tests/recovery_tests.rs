use chrono::NaiveDate;
use serde_json::{json, Value};
use study_planner::{
    extract_records, recover_plan, recover_questions, repair::enforce_daily_hours, ExtractionStage,
    GenerationConfig, PlanRequest, QuestionBody, QuestionRequest, QuestionType, RecoveryError, Task,
    PLAN_SCHEMA, QUESTION_SCHEMA,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn one_day_plan() -> PlanRequest {
    PlanRequest {
        subjects: vec!["Math".to_string(), "English".to_string()],
        start_date: date(2024, 3, 1),
        end_date: date(2024, 3, 1),
        daily_hours: 2.0,
    }
}

fn quiz_request() -> QuestionRequest {
    QuestionRequest {
        course_name: Some("Arithmetic".to_string()),
        types: vec![QuestionType::SingleChoice, QuestionType::TrueFalse],
        source_text: None,
    }
}

fn day_totals(tasks: &[Task]) -> Vec<(NaiveDate, f64)> {
    let mut totals: Vec<(NaiveDate, f64)> = Vec::new();
    for task in tasks {
        match totals.iter_mut().find(|(d, _)| *d == task.date) {
            Some((_, hours)) => *hours += task.duration,
            None => totals.push((task.date, task.duration)),
        }
    }
    totals
}

#[test]
fn test_overfull_day_is_rescaled_proportionally() {
    let response = r#"[{"subject":"Math","duration":1.5,"date":"2024-03-01"},{"subject":"English","duration":1.0,"date":"2024-03-01"}]"#;
    let outcome = recover_plan(&one_day_plan(), response, &GenerationConfig::default()).unwrap();

    assert_eq!(outcome.stage, ExtractionStage::Direct);
    assert_eq!(outcome.rescaled_days, vec![date(2024, 3, 1)]);
    assert_eq!(outcome.tasks.len(), 2);
    assert_eq!(outcome.tasks[0].duration, 1.2);
    assert_eq!(outcome.tasks[1].duration, 0.8);
    assert_eq!(outcome.tasks[0].id, "task-1");
    assert_eq!(outcome.tasks[1].subject, "English");
    assert!((outcome.summary.total_hours - 2.0).abs() <= 0.01);
}

#[test]
fn test_fenced_plan_needs_no_repair() {
    let response = "Here is the plan you asked for.\n```json\n[{\"subject\":\"Math\",\"duration\":2,\"date\":\"2024-03-01\"}]\n```\nEnjoy!";
    let outcome = recover_plan(&one_day_plan(), response, &GenerationConfig::default()).unwrap();

    assert_eq!(outcome.stage, ExtractionStage::Fenced);
    assert_eq!(outcome.tasks.len(), 1);
    assert_eq!(outcome.tasks[0].duration, 2.0);
    assert!(outcome.rescaled_days.is_empty());
}

#[test]
fn test_wrapped_tasks_are_unwrapped() {
    let response = json!({
        "tasks": [
            {"subject": "Math", "description": "Limits", "duration": 1, "date": "2024-03-01"},
            {"subject": "English", "description": "Essay outline", "duration": 1, "date": "2024-03-01"}
        ]
    })
    .to_string();
    let outcome = recover_plan(&one_day_plan(), &response, &GenerationConfig::default()).unwrap();

    assert_eq!(outcome.stage, ExtractionStage::Direct);
    assert_eq!(outcome.tasks[0].description, "Limits");
    assert!(outcome.rescaled_days.is_empty());
}

#[test]
fn test_unquoted_keys_are_recovered_by_repair() {
    let response = r#"[{id: "q1", content: "What is 2+2?", type: "choice", answer: "4"}]"#;
    let outcome = recover_questions(&quiz_request(), response).unwrap();

    assert_eq!(outcome.stage, ExtractionStage::Repaired);
    assert_eq!(outcome.questions.len(), 1);
    let question = &outcome.questions[0];
    assert_eq!(question.id, "q-1");
    assert_eq!(question.content, "What is 2+2?");
    assert_eq!(question.body.answer_text(), "4");
    assert_eq!(question.subject, "Arithmetic");
}

#[test]
fn test_unstructured_prose_fails_after_every_stage() {
    let response = "Unfortunately I am unable to help with that request today.";
    match recover_plan(&one_day_plan(), response, &GenerationConfig::default()) {
        Err(RecoveryError::RecoveryFailed { attempts }) => {
            assert_eq!(attempts.len(), 4);
            assert_eq!(attempts[3].stage, ExtractionStage::Salvage);
        }
        other => panic!("expected RecoveryFailed, got {:?}", other),
    }
}

#[test]
fn test_well_formed_records_pass_through_unchanged() {
    let records = json!([
        {"content": "Q1", "type": "judge", "answer": "true", "analysis": "a"},
        {"content": "Q2", "type": "fill", "answer": "x", "analysis": "b"}
    ]);
    let candidate = extract_records(&records.to_string(), &QUESTION_SCHEMA).unwrap();
    assert_eq!(candidate.stage, ExtractionStage::Direct);
    assert_eq!(Value::Array(candidate.records), records);
}

#[test]
fn test_fenced_trailing_comma_matches_direct_repair() {
    let inner = "[{\"subject\":\"Math\",\"duration\":2,\"date\":\"2024-03-01\"},]";
    let fenced = format!("```json\n{}\n```", inner);

    let from_fence = extract_records(&fenced, &PLAN_SCHEMA).unwrap();
    let from_bare = extract_records(inner, &PLAN_SCHEMA).unwrap();

    assert_eq!(from_fence.stage, ExtractionStage::Repaired);
    assert_eq!(from_bare.stage, ExtractionStage::Repaired);
    assert_eq!(from_fence.records, from_bare.records);
}

#[test]
fn test_salvage_only_builds_records_for_content_matches() {
    let response = r#"Sure, here are your questions:
        {"content": "Is Rust garbage collected?", "type": "judge", "answer": "false",
        {"content": "Name the trait for formatting with {}", "type": "essay", "answer": "Display",
        {"content": "What keyword declares a constant?", "answer": "const"
    "#;
    let outcome = recover_questions(&quiz_request(), response).unwrap();

    assert_eq!(outcome.stage, ExtractionStage::Salvage);
    assert_eq!(outcome.questions.len(), 3);
    assert_eq!(outcome.questions[0].question_type(), QuestionType::TrueFalse);
    assert_eq!(outcome.questions[1].question_type(), QuestionType::ShortAnswer);
    // no type match at the third position; two types requested, so short answer
    assert_eq!(outcome.questions[2].body, QuestionBody::ShortAnswer { answer: "const".to_string() });
}

#[test]
fn test_every_repaired_day_meets_the_target() {
    let request = PlanRequest {
        subjects: vec!["Physics".to_string(), "Chemistry".to_string(), "Biology".to_string()],
        start_date: date(2024, 2, 28),
        end_date: date(2024, 3, 2),
        daily_hours: 3.0,
    };
    let response = json!([
        {"subject": "Physics", "description": "Kinematics", "duration": 1.5, "date": "2024-02-28"},
        {"subject": "Chemistry", "description": "Moles", "duration": 1.5, "date": "2024-02-28"},
        {"subject": "Biology", "description": "Cells", "duration": 2.5, "date": "2024-02-29"},
        {"subject": "Physics", "description": "Forces", "duration": 1.0, "date": "2024-02-29"},
        {"subject": "Chemistry", "description": "Bonds", "duration": 0.5, "date": "2024-02-29"},
        {"subject": "biology", "description": "Genetics", "date": "2024-03-01"},
        {"subject": "Physics", "description": "Energy", "duration": 0.7, "date": "2024-03-02"},
        {"subject": "Chemistry", "description": "Acids", "duration": 0.6, "date": "2024-03-02"},
        {"subject": "Biology", "description": "Ecology", "duration": 0.4, "date": "2024-03-02"}
    ])
    .to_string();

    let outcome = recover_plan(&request, &response, &GenerationConfig::default()).unwrap();

    for (day, hours) in day_totals(&outcome.tasks) {
        assert!((hours - 3.0).abs() <= 0.01, "{} sums to {}", day, hours);
    }
    assert_eq!(outcome.tasks[5].subject, "Biology");
    assert_eq!(
        outcome.rescaled_days,
        vec![date(2024, 2, 29), date(2024, 3, 1), date(2024, 3, 2)]
    );
}

#[test]
fn test_repair_twice_equals_repair_once() {
    let response = r#"[
        {"subject":"Math","duration":1.7,"date":"2024-03-01"},
        {"subject":"English","duration":0.9,"date":"2024-03-01"},
        {"subject":"Math","duration":0.3,"date":"2024-03-01"}
    ]"#;
    let outcome = recover_plan(&one_day_plan(), response, &GenerationConfig::default()).unwrap();

    let mut again = outcome.tasks.clone();
    let report = enforce_daily_hours(&mut again, 2.0, 0.01).unwrap();
    assert!(report.rescaled_days.is_empty());
    assert_eq!(again, outcome.tasks);
}

#[test]
fn test_out_of_range_dates_fall_back_to_start() {
    let request = PlanRequest {
        end_date: date(2024, 3, 3),
        ..one_day_plan()
    };
    let response = r#"[{"subject":"Math","description":"Review","duration":2,"date":"2024-04-01"},
                       {"subject":"Math","description":"Drill","duration":2,"date":"2024-03-03"}]"#;
    let outcome = recover_plan(&request, response, &GenerationConfig::default()).unwrap();
    assert_eq!(outcome.tasks[0].date, date(2024, 3, 1));
    assert_eq!(outcome.tasks[1].date, date(2024, 3, 3));
}

#[test]
fn test_structure_without_usable_records_is_empty_result() {
    let response = r#"{"questions": [{"type": "judge", "answer": "true"}, {"content": ""}]}"#;
    match recover_questions(&quiz_request(), response) {
        Err(RecoveryError::EmptyResult { stage, kind, dropped }) => {
            assert_eq!(stage, ExtractionStage::Direct);
            assert_eq!(kind, "questions");
            assert_eq!(dropped, 2);
        }
        other => panic!("expected EmptyResult, got {:?}", other),
    }
}

#[test]
fn test_invalid_requests_are_rejected_before_extraction() {
    let reversed = PlanRequest {
        start_date: date(2024, 3, 2),
        end_date: date(2024, 3, 1),
        ..one_day_plan()
    };
    assert!(matches!(
        recover_plan(&reversed, "[]", &GenerationConfig::default()),
        Err(RecoveryError::InvalidRequest(_))
    ));

    let no_types = QuestionRequest {
        types: vec![],
        ..quiz_request()
    };
    assert!(matches!(
        recover_questions(&no_types, "[]"),
        Err(RecoveryError::InvalidRequest(_))
    ));
}

#[test]
fn test_daily_hours_beyond_a_full_day_are_rejected() {
    let response = r#"[{"subject":"Math","duration":1.0,"date":"2024-03-01"},{"subject":"English","duration":1.0,"date":"2024-03-01"}]"#;
    for hours in [24.01, 1e17, 1e300] {
        let request = PlanRequest {
            daily_hours: hours,
            ..one_day_plan()
        };
        assert!(matches!(
            recover_plan(&request, response, &GenerationConfig::default()),
            Err(RecoveryError::InvalidRequest(_))
        ));
    }

    let full_day = PlanRequest {
        daily_hours: 24.0,
        ..one_day_plan()
    };
    let outcome = recover_plan(&full_day, response, &GenerationConfig::default()).unwrap();
    assert_eq!(outcome.tasks[0].duration, 12.0);
    assert_eq!(outcome.tasks[1].duration, 12.0);
}

#[test]
fn test_plan_range_is_capped() {
    let request = PlanRequest {
        start_date: date(1, 1, 1),
        end_date: date(9999, 12, 31),
        ..one_day_plan()
    };
    match recover_plan(&request, "[]", &GenerationConfig::default()) {
        Err(RecoveryError::InvalidRequest(message)) => assert!(message.contains("limit is 366")),
        other => panic!("expected InvalidRequest, got {:?}", other),
    }

    let limits = GenerationConfig {
        max_plan_days: 3,
        ..GenerationConfig::default()
    };
    let four_days = PlanRequest {
        end_date: date(2024, 3, 4),
        ..one_day_plan()
    };
    assert!(recover_plan(&four_days, "[]", &limits).is_err());
}

#[test]
fn test_target_too_small_to_share_is_unsatisfiable() {
    let request = PlanRequest {
        daily_hours: 0.01,
        ..one_day_plan()
    };
    let response = r#"[
        {"subject":"Math","duration":1.0,"date":"2024-03-01"},
        {"subject":"English","duration":1.0,"date":"2024-03-01"},
        {"subject":"Math","duration":1.0,"date":"2024-03-01"}
    ]"#;
    match recover_plan(&request, response, &GenerationConfig::default()) {
        Err(RecoveryError::ConstraintUnsatisfiable { date: day, actual }) => {
            assert_eq!(day, date(2024, 3, 1));
            assert_eq!(actual, 3.0);
        }
        other => panic!("expected ConstraintUnsatisfiable, got {:?}", other),
    }
}
