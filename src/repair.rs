use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::errors::RecoveryError;
use crate::log_pipeline_stage;
use crate::models::Task;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairReport {
    /// Dates whose durations were rescaled, in date order.
    pub rescaled_days: Vec<NaiveDate>,
}

/// Rescale task durations so each date sums to `target` hours.
///
/// Days already within `tolerance` are left untouched, which makes the
/// operation idempotent. Rescaled values are rounded to hundredths; the
/// rounding residue goes to the day's longest task so the total is exact.
/// Nothing is modified unless every day can be repaired. A target whose
/// hundredths overflow the cent arithmetic is reported as unsatisfiable.
pub fn enforce_daily_hours(
    tasks: &mut [Task],
    target: f64,
    tolerance: f64,
) -> Result<RepairReport, RecoveryError> {
    let mut days: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (index, task) in tasks.iter().enumerate() {
        days.entry(task.date).or_default().push(index);
    }

    let target_cents = to_cents(target);
    let mut updates: Vec<(usize, f64)> = Vec::new();
    let mut report = RepairReport::default();

    for (date, indices) in &days {
        let actual: f64 = indices.iter().map(|&i| tasks[i].duration).sum();
        if (actual - target).abs() <= tolerance {
            continue;
        }
        if !actual.is_finite() || actual <= 0.0 {
            return Err(RecoveryError::ConstraintUnsatisfiable { date: *date, actual });
        }

        let ratio = target / actual;
        let mut cents: Vec<i64> = indices
            .iter()
            .map(|&i| to_cents(tasks[i].duration * ratio).max(1))
            .collect();

        let unsatisfiable = || RecoveryError::ConstraintUnsatisfiable { date: *date, actual };
        let residual = cents
            .iter()
            .try_fold(0_i64, |acc, &c| acc.checked_add(c))
            .and_then(|sum| target_cents.checked_sub(sum))
            .ok_or_else(unsatisfiable)?;
        if let Some(largest) = (0..cents.len()).max_by_key(|&k| (cents[k], std::cmp::Reverse(k))) {
            cents[largest] = cents[largest]
                .checked_add(residual)
                .ok_or_else(unsatisfiable)?;
        }
        if cents.iter().any(|&c| c <= 0) {
            return Err(unsatisfiable());
        }

        log_pipeline_stage!(repaired, "tasks", date = date, actual = actual, target = target);
        updates.extend(indices.iter().zip(cents).map(|(&i, c)| (i, c as f64 / 100.0)));
        report.rescaled_days.push(*date);
    }

    for (index, duration) in updates {
        tasks[index].duration = duration;
    }

    Ok(report)
}

fn to_cents(hours: f64) -> i64 {
    (hours * 100.0).round() as i64
}
