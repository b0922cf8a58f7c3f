//! Recurrence engine: computes and persists successor occurrences for
//! recurring tasks.
//!
//! The engine runs when a recurring task is created. Failures here are
//! never fatal to the caller: the primary task write has already happened,
//! so anything that goes wrong scheduling the next occurrence is logged
//! and dropped.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::fields::{RecurrenceKind, Status};
use crate::store::{Kv, TaskStore};
use crate::task::{RecurrencePattern, Task};

/// Compute the successor due date for a pattern anchored at `due`.
///
/// Custom patterns pick the next listed weekday (0=Sunday..6=Saturday)
/// strictly after the anchor's weekday, wrapping to the following week;
/// the interval is not consulted for custom patterns. Monthly arithmetic
/// clamps the day-of-month (Jan 31 + 1 month lands on the end of February).
pub fn next_due(pattern: &RecurrencePattern, due: NaiveDate) -> Result<NaiveDate> {
    match pattern.kind {
        RecurrenceKind::Daily => Ok(due + Duration::days(pattern.interval as i64)),
        RecurrenceKind::Weekly => Ok(due + Duration::days(pattern.interval as i64 * 7)),
        RecurrenceKind::Monthly => due
            .checked_add_months(Months::new(pattern.interval))
            .ok_or_else(|| Error::InvalidRecurrence("monthly advance out of range".into())),
        RecurrenceKind::Custom => {
            let days = pattern
                .days_of_week
                .as_deref()
                .filter(|d| !d.is_empty())
                .ok_or_else(|| Error::InvalidRecurrence("custom pattern without weekdays".into()))?;
            if days.iter().any(|&d| d > 6) {
                return Err(Error::InvalidRecurrence("weekday out of 0-6 range".into()));
            }
            let mut days = days.to_vec();
            days.sort_unstable();
            days.dedup();

            let current = due.weekday().num_days_from_sunday() as u8;
            let days_to_add = match days.iter().find(|&&d| d > current) {
                Some(&next) => (next - current) as i64,
                // Wrap to the earliest listed day next week.
                None => (7 - current + days[0]) as i64,
            };
            Ok(due + Duration::days(days_to_add))
        }
    }
}

/// The assignee rotation applied to successors: the list rotated left by
/// one, `[a1, a2, .., a0]`. Lists of one or zero entries pass through.
pub fn rotate_assignees(assigned: &[String]) -> Vec<String> {
    if assigned.len() <= 1 {
        return assigned.to_vec();
    }
    let mut rotated = assigned.to_vec();
    rotated.rotate_left(1);
    rotated
}

/// Materialize the successor record: static fields cloned, completion
/// state cleared, fresh id and stamps.
fn build_successor(source: &Task, due: NaiveDate, now: DateTime<Utc>) -> Task {
    let pattern = source.recurrence.as_ref();
    let rotate = pattern.map(|p| p.assignment_rotation).unwrap_or(false);
    Task {
        id: Uuid::new_v4().to_string(),
        property_id: source.property_id.clone(),
        title: source.title.clone(),
        description: source.description.clone(),
        instructions: source.instructions.clone(),
        category: source.category,
        priority: source.priority,
        status: Status::Pending,
        assigned_to: if rotate {
            rotate_assignees(&source.assigned_to)
        } else {
            source.assigned_to.clone()
        },
        due: Some(due),
        estimated_minutes: source.estimated_minutes,
        recurrence: source.recurrence.clone(),
        completed_at: None,
        completed_by: None,
        completion_notes: None,
        quality_rating: None,
        completion_photos: Vec::new(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

/// Schedule the next occurrence of `source`, if any, and persist it.
///
/// Returns the successor when one was created. A source without a pattern
/// or a due date, a finished series (`end_date` passed), an invalid
/// pattern, or a store failure all yield `None`; only the invalid and
/// failing cases log.
pub fn spawn_next<K: Kv>(
    store: &mut TaskStore<K>,
    source: &Task,
    now: DateTime<Utc>,
) -> Option<Task> {
    let pattern = source.recurrence.as_ref()?;
    let Some(due) = source.due else {
        warn!(task = %source.id, "recurring task has no due date anchor, not scheduling successor");
        return None;
    };

    let next = match next_due(pattern, due) {
        Ok(next) => next,
        Err(e) => {
            warn!(task = %source.id, error = %e, "not scheduling successor");
            return None;
        }
    };

    // Series termination is silent.
    if let Some(end) = pattern.end_date {
        if next > end {
            return None;
        }
    }

    let mut successor = build_successor(source, next, now);
    match store.save_task(&mut successor, now) {
        Ok(()) => Some(successor),
        Err(e) => {
            warn!(task = %source.id, error = %e, "failed to persist successor");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{Category, Priority};
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn pattern(kind: RecurrenceKind, interval: u32) -> RecurrencePattern {
        RecurrencePattern {
            kind,
            interval,
            days_of_week: None,
            end_date: None,
            assignment_rotation: false,
        }
    }

    fn recurring_task(pat: RecurrencePattern, due: NaiveDate) -> Task {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let mut task = Task::new(
            "src".into(),
            "casa-verde".into(),
            "Take out bins".into(),
            Category::Cleaning,
            Priority::Medium,
            now,
        );
        task.due = Some(due);
        task.recurrence = Some(pat);
        task
    }

    #[test]
    fn daily_advances_by_interval_days() {
        let next = next_due(&pattern(RecurrenceKind::Daily, 1), d(2025, 1, 1)).unwrap();
        assert_eq!(next, d(2025, 1, 2));
    }

    #[test]
    fn weekly_advances_by_interval_weeks() {
        // 2025-01-01 is a Wednesday.
        let next = next_due(&pattern(RecurrenceKind::Weekly, 2), d(2025, 1, 1)).unwrap();
        assert_eq!(next, d(2025, 1, 15));
    }

    #[test]
    fn monthly_clamps_day_of_month() {
        let next = next_due(&pattern(RecurrenceKind::Monthly, 1), d(2025, 1, 31)).unwrap();
        assert_eq!(next, d(2025, 2, 28));
    }

    #[test]
    fn custom_picks_next_listed_weekday() {
        let mut pat = pattern(RecurrenceKind::Custom, 1);
        pat.days_of_week = Some(vec![1, 5]); // Monday, Friday
        // 2025-01-01 is Wednesday (weekday 3): next listed day is Friday.
        assert_eq!(next_due(&pat, d(2025, 1, 1)).unwrap(), d(2025, 1, 3));
        // From Friday (5) there is no later listed day: wrap to next Monday.
        assert_eq!(next_due(&pat, d(2025, 1, 3)).unwrap(), d(2025, 1, 6));
    }

    #[test]
    fn custom_without_weekdays_is_invalid() {
        let mut pat = pattern(RecurrenceKind::Custom, 1);
        assert!(matches!(
            next_due(&pat, d(2025, 1, 1)),
            Err(Error::InvalidRecurrence(_))
        ));
        pat.days_of_week = Some(vec![]);
        assert!(matches!(
            next_due(&pat, d(2025, 1, 1)),
            Err(Error::InvalidRecurrence(_))
        ));
    }

    #[test]
    fn rotation_moves_head_to_tail() {
        let rotated = rotate_assignees(&["a".into(), "b".into(), "c".into()]);
        assert_eq!(rotated, vec!["b".to_string(), "c".to_string(), "a".to_string()]);
        assert_eq!(rotate_assignees(&["solo".to_string()]), vec!["solo".to_string()]);
        assert!(rotate_assignees(&[]).is_empty());
    }

    #[test]
    fn spawn_creates_pending_successor_with_cleared_completion() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap();
        let mut store = TaskStore::new(MemoryStore::default());
        let mut pat = pattern(RecurrenceKind::Daily, 1);
        pat.assignment_rotation = true;
        let mut source = recurring_task(pat, d(2025, 1, 1));
        source.assigned_to = vec!["a".into(), "b".into(), "c".into()];
        source.completed_at = Some(now);
        source.completed_by = Some("a".into());
        source.quality_rating = Some(5);
        source.completion_photos = vec!["p.jpg".into()];

        let successor = spawn_next(&mut store, &source, now).unwrap();
        assert_ne!(successor.id, source.id);
        assert_eq!(successor.due, Some(d(2025, 1, 2)));
        assert_eq!(successor.status, Status::Pending);
        assert_eq!(
            successor.assigned_to,
            vec!["b".to_string(), "c".to_string(), "a".to_string()]
        );
        assert_eq!(successor.completed_at, None);
        assert_eq!(successor.completed_by, None);
        assert_eq!(successor.quality_rating, None);
        assert!(successor.completion_photos.is_empty());
        assert_eq!(successor.recurrence, source.recurrence);
        // Persisted through the adapter.
        let listed = store.list_property_tasks("casa-verde");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, successor.id);
    }

    #[test]
    fn series_ends_silently_past_end_date() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let mut store = TaskStore::new(MemoryStore::default());
        let mut pat = pattern(RecurrenceKind::Daily, 1);
        pat.end_date = Some(d(2025, 1, 1));
        let source = recurring_task(pat, d(2025, 1, 1));

        assert!(spawn_next(&mut store, &source, now).is_none());
        assert!(store.list_property_tasks("casa-verde").is_empty());
    }

    #[test]
    fn missing_due_date_is_a_noop() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let mut store = TaskStore::new(MemoryStore::default());
        let mut source = recurring_task(pattern(RecurrenceKind::Daily, 1), d(2025, 1, 1));
        source.due = None;
        assert!(spawn_next(&mut store, &source, now).is_none());
    }

    #[test]
    fn non_recurring_task_is_a_noop() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let mut store = TaskStore::new(MemoryStore::default());
        let mut source = recurring_task(pattern(RecurrenceKind::Daily, 1), d(2025, 1, 1));
        source.recurrence = None;
        assert!(spawn_next(&mut store, &source, now).is_none());
    }
}
