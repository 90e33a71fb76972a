use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::Task;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTotal {
    pub date: NaiveDate,
    pub hours: f64,
    pub tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTotal {
    pub subject: String,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub days: Vec<DayTotal>,
    pub subjects: Vec<SubjectTotal>,
    pub total_hours: f64,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// 0.0 to 1.0
    pub completion_ratio: f64,
}

impl PlanSummary {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut days: BTreeMap<NaiveDate, DayTotal> = BTreeMap::new();
        let mut subjects: Vec<SubjectTotal> = Vec::new();

        for task in tasks {
            let day = days.entry(task.date).or_insert_with(|| DayTotal {
                date: task.date,
                hours: 0.0,
                tasks: 0,
            });
            day.hours = round_hours(day.hours + task.duration);
            day.tasks += 1;

            match subjects.iter_mut().find(|s| s.subject == task.subject) {
                Some(total) => total.hours = round_hours(total.hours + task.duration),
                None => subjects.push(SubjectTotal {
                    subject: task.subject.clone(),
                    hours: round_hours(task.duration),
                }),
            }
        }

        let completed_tasks = tasks.iter().filter(|t| t.completed).count();
        let completion_ratio = if tasks.is_empty() {
            0.0
        } else {
            completed_tasks as f64 / tasks.len() as f64
        };

        PlanSummary {
            days: days.into_values().collect(),
            subjects,
            total_hours: round_hours(tasks.iter().map(|t| t.duration).sum()),
            total_tasks: tasks.len(),
            completed_tasks,
            completion_ratio,
        }
    }
}

/// Mark a task done or not done. Returns false when no task has `id`.
pub fn set_task_completed(tasks: &mut [Task], id: &str, completed: bool) -> bool {
    match tasks.iter_mut().find(|task| task.id == id) {
        Some(task) => {
            task.completed = completed;
            true
        }
        None => false,
    }
}

fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}
