//! Deadline timeline: flattens extracted tasks across conversations and
//! groups them into calendar buckets relative to "now".
//!
//! Calendar semantics, not fixed windows: `today` is the same calendar day,
//! `this_week` the same ISO week (Monday start), `this_month` the same
//! calendar month. Tasks with no parseable due date land in `tbd`, which is
//! pinned to the top of the presentation order because it represents
//! unresolved ambiguity requiring user action.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::Serialize;

use crate::models::analysis::{AnalysisResult, TaskType};
use crate::models::state::DeadlineOverride;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineBucket {
    Tbd,
    Overdue,
    Today,
    ThisWeek,
    ThisMonth,
    Later,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineTask {
    pub conversation_id: String,
    pub task_index: usize,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_raw: Option<String>,
    pub task_type: TaskType,
}

/// Bucketed tasks. Field order is the presentation order: `tbd` first.
#[derive(Debug, Default, Serialize)]
pub struct Timeline {
    pub tbd: Vec<TimelineTask>,
    pub overdue: Vec<TimelineTask>,
    pub today: Vec<TimelineTask>,
    pub this_week: Vec<TimelineTask>,
    pub this_month: Vec<TimelineTask>,
    pub later: Vec<TimelineTask>,
}

impl Timeline {
    fn push(&mut self, bucket: DeadlineBucket, task: TimelineTask) {
        match bucket {
            DeadlineBucket::Tbd => self.tbd.push(task),
            DeadlineBucket::Overdue => self.overdue.push(task),
            DeadlineBucket::Today => self.today.push(task),
            DeadlineBucket::ThisWeek => self.this_week.push(task),
            DeadlineBucket::ThisMonth => self.this_month.push(task),
            DeadlineBucket::Later => self.later.push(task),
        }
    }

    /// Buckets in presentation order, `tbd` pinned first.
    pub fn ordered(&self) -> [(DeadlineBucket, &Vec<TimelineTask>); 6] {
        [
            (DeadlineBucket::Tbd, &self.tbd),
            (DeadlineBucket::Overdue, &self.overdue),
            (DeadlineBucket::Today, &self.today),
            (DeadlineBucket::ThisWeek, &self.this_week),
            (DeadlineBucket::ThisMonth, &self.this_month),
            (DeadlineBucket::Later, &self.later),
        ]
    }
}

/// Parses a due string as produced by the analysis service: the display
/// format "Oct 21, 2023, 17:00", RFC 3339, or the literal "TBD".
pub fn parse_due(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("tbd") {
        return None;
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%b %d, %Y, %H:%M") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    None
}

/// Calendar classification of a due instant against `now`.
pub fn classify(due: DateTime<Utc>, now: DateTime<Utc>) -> DeadlineBucket {
    let due_day = due.date_naive();
    let today = now.date_naive();

    if due_day < today {
        return DeadlineBucket::Overdue;
    }
    if due_day == today {
        return DeadlineBucket::Today;
    }
    let (due_week, now_week) = (due_day.iso_week(), today.iso_week());
    if due_week.year() == now_week.year() && due_week.week() == now_week.week() {
        return DeadlineBucket::ThisWeek;
    }
    if due_day.year() == today.year() && due_day.month() == today.month() {
        return DeadlineBucket::ThisMonth;
    }
    DeadlineBucket::Later
}

/// Flattens every task in `results`, applies per-task deadline overrides,
/// and buckets. Non-`tbd` buckets sort ascending by due instant.
pub fn build_timeline(
    results: &HashMap<String, AnalysisResult>,
    overrides: &[DeadlineOverride],
    now: DateTime<Utc>,
) -> Timeline {
    let override_map: HashMap<(&str, usize), &str> = overrides
        .iter()
        .map(|o| {
            (
                (o.conversation_id.as_str(), o.task_index),
                o.override_deadline.as_str(),
            )
        })
        .collect();

    let mut timeline = Timeline::default();

    let mut ids: Vec<&String> = results.keys().collect();
    ids.sort();

    for id in ids {
        let result = &results[id];
        for (index, task) in result.tasks.iter().enumerate() {
            let due_raw = override_map
                .get(&(id.as_str(), index))
                .map(|s| s.to_string())
                .or_else(|| task.due.clone());
            let due = due_raw.as_deref().and_then(parse_due);

            let entry = TimelineTask {
                conversation_id: id.clone(),
                task_index: index,
                title: task.title.clone(),
                owner: task.owner.clone(),
                due,
                due_raw,
                task_type: task.task_type,
            };

            match due {
                None => timeline.push(DeadlineBucket::Tbd, entry),
                Some(instant) => timeline.push(classify(instant, now), entry),
            }
        }
    }

    for bucket in [
        &mut timeline.overdue,
        &mut timeline.today,
        &mut timeline.this_week,
        &mut timeline.this_month,
        &mut timeline.later,
    ] {
        bucket.sort_by_key(|t| t.due);
    }

    timeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::models::analysis::{ExtractedTask, Priority};

    fn task(title: &str, due: Option<&str>) -> ExtractedTask {
        ExtractedTask {
            title: title.to_string(),
            owner: None,
            due: due.map(String::from),
            task_type: TaskType::Deadline,
        }
    }

    fn result_with_tasks(id: &str, tasks: Vec<ExtractedTask>) -> (String, AnalysisResult) {
        (
            id.to_string(),
            AnalysisResult {
                id: id.to_string(),
                summary: String::new(),
                priority: Priority::default(),
                tasks,
            },
        )
    }

    // Saturday 2026-08-08 12:00 UTC; ISO week 32 runs Mon 08-03 .. Sun 08-09.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 8, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_display_format() {
        let due = parse_due("Oct 21, 2023, 17:00").unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2023, 10, 21, 17, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rfc3339() {
        let due = parse_due("2026-08-08T09:30:00Z").unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2026, 8, 8, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_tbd_and_garbage() {
        assert!(parse_due("TBD").is_none());
        assert!(parse_due("next week sometime").is_none());
        assert!(parse_due("").is_none());
    }

    #[test]
    fn test_yesterday_is_overdue() {
        let due = Utc.with_ymd_and_hms(2026, 8, 7, 23, 59, 0).unwrap();
        assert_eq!(classify(due, now()), DeadlineBucket::Overdue);
    }

    #[test]
    fn test_earlier_today_is_today_not_overdue() {
        // calendar-day granularity: a passed instant today is still "today"
        let due = Utc.with_ymd_and_hms(2026, 8, 8, 8, 0, 0).unwrap();
        assert_eq!(classify(due, now()), DeadlineBucket::Today);
    }

    #[test]
    fn test_tomorrow_same_iso_week() {
        // Sunday 08-09 is still ISO week 32
        let due = Utc.with_ymd_and_hms(2026, 8, 9, 9, 0, 0).unwrap();
        assert_eq!(classify(due, now()), DeadlineBucket::ThisWeek);
    }

    #[test]
    fn test_next_monday_is_not_this_week() {
        // Monday 08-10 starts ISO week 33; same month though
        let due = Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap();
        assert_eq!(classify(due, now()), DeadlineBucket::ThisMonth);
    }

    #[test]
    fn test_next_month_is_later() {
        let due = Utc.with_ymd_and_hms(2026, 9, 1, 9, 0, 0).unwrap();
        assert_eq!(classify(due, now()), DeadlineBucket::Later);
    }

    #[test]
    fn test_tbd_pinned_first_in_presentation_order() {
        let results: HashMap<String, AnalysisResult> = [result_with_tasks(
            "c1",
            vec![
                task("ambiguous", Some("TBD")),
                task("late", Some("Aug 07, 2026, 17:00")),
            ],
        )]
        .into();

        let timeline = build_timeline(&results, &[], now());
        assert_eq!(timeline.tbd.len(), 1);
        assert_eq!(timeline.overdue.len(), 1);

        let ordered = timeline.ordered();
        assert_eq!(ordered[0].0, DeadlineBucket::Tbd);
        assert!(!ordered[0].1.is_empty());
    }

    #[test]
    fn test_bucket_sorted_ascending_by_due() {
        let results: HashMap<String, AnalysisResult> = [result_with_tasks(
            "c1",
            vec![
                task("second", Some("Aug 06, 2026, 17:00")),
                task("first", Some("Aug 05, 2026, 09:00")),
            ],
        )]
        .into();

        let timeline = build_timeline(&results, &[], now());
        let titles: Vec<&str> = timeline.overdue.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[test]
    fn test_override_replaces_due_before_bucketing() {
        let results: HashMap<String, AnalysisResult> =
            [result_with_tasks("c1", vec![task("review", Some("TBD"))])].into();
        let overrides = vec![DeadlineOverride {
            conversation_id: "c1".to_string(),
            task_index: 0,
            original_deadline: "TBD".to_string(),
            override_deadline: "Aug 08, 2026, 17:00".to_string(),
        }];

        let timeline = build_timeline(&results, &overrides, now());
        assert!(timeline.tbd.is_empty());
        assert_eq!(timeline.today.len(), 1);
        assert_eq!(timeline.today[0].due_raw.as_deref(), Some("Aug 08, 2026, 17:00"));
    }

    #[test]
    fn test_no_due_lands_in_tbd() {
        let results: HashMap<String, AnalysisResult> =
            [result_with_tasks("c1", vec![task("loose end", None)])].into();
        let timeline = build_timeline(&results, &[], now());
        assert_eq!(timeline.tbd.len(), 1);
    }
}
