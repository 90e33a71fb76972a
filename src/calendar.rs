use chrono::NaiveDate;

/// Number of calendar days from `start` to `end`, both ends included.
/// Returns 0 when `end` precedes `start`. Plain calendar dates, no time zones:
/// 2024-03-01 to 2024-03-01 is one day wherever the server runs.
pub fn inclusive_day_count(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return 0;
    }
    (end - start).num_days() + 1
}

/// Every date from `start` through `end`, in order.
pub fn dates_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|day| *day <= end).collect()
}

/// Parses the date formats models produce for a plan date. Only the leading
/// `YYYY-MM-DD` (or `YYYY/MM/DD`) part is considered, so `2024-03-01T00:00:00Z`
/// is accepted as 2024-03-01.
pub fn parse_plan_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let head: String = trimmed.chars().take(10).collect();
    NaiveDate::parse_from_str(&head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&head, "%Y/%m/%d"))
        .ok()
}
