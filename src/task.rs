//! Task data structure and related functionality.
//!
//! This module defines the core `Task` struct representing a single unit of
//! property-operational work, along with its embedded recurrence pattern.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::*;

/// A rule describing how a task spawns a successor occurrence.
///
/// `days_of_week` uses 0=Sunday .. 6=Saturday and is only meaningful for
/// [`RecurrenceKind::Custom`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrencePattern {
    #[serde(rename = "type")]
    pub kind: RecurrenceKind,
    pub interval: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub assignment_rotation: bool,
}

/// A unit of property-operational work with assignment, scheduling and
/// completion tracking.
///
/// Tasks are scoped to exactly one property. Soft deletion stamps
/// `deleted_at`; a soft-deleted task never surfaces in listings or
/// aggregations but is not physically removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub property_id: String,
    pub title: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub category: Category,
    pub priority: Priority,
    pub status: Status,
    /// Ordered assignee identifiers. May be empty; such tasks simply never
    /// surface on personal dashboards.
    pub assigned_to: Vec<String>,
    pub due: Option<NaiveDate>,
    /// Estimated effort in minutes.
    pub estimated_minutes: Option<u32>,
    pub recurrence: Option<RecurrencePattern>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub completion_notes: Option<String>,
    /// 1-5 when rated.
    pub quality_rating: Option<u8>,
    pub completion_photos: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Build a new pending task with fresh timestamps.
    pub fn new(
        id: String,
        property_id: String,
        title: String,
        category: Category,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Self {
        Task {
            id,
            property_id,
            title,
            description: None,
            instructions: None,
            category,
            priority,
            status: Status::Pending,
            assigned_to: Vec::new(),
            due: None,
            estimated_minutes: None,
            recurrence: None,
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

    /// View-time overdue classification: the due date has passed and the
    /// task is not in a terminal state. Independent of the stored status
    /// value, so a record that was never explicitly transitioned still
    /// reads as overdue.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.due {
            Some(due) => due < today && !self.status.is_terminal(),
            None => false,
        }
    }

    /// Status as displayed: stored status with the overdue classification
    /// applied on top of Pending/InProgress.
    pub fn effective_status(&self, today: NaiveDate) -> Status {
        if matches!(self.status, Status::Pending | Status::InProgress) && self.is_overdue(today) {
            Status::Overdue
        } else {
            self.status
        }
    }

    /// Hours between creation and completion, when both stamps exist.
    pub fn completion_hours(&self) -> Option<f64> {
        let done = self.completed_at?;
        Some((done - self.created_at).num_milliseconds() as f64 / 3_600_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_task() -> Task {
        Task::new(
            "t1".into(),
            "prop-1".into(),
            "Clean kitchen".into(),
            Category::Cleaning,
            Priority::Medium,
            Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap(),
        )
    }

    #[test]
    fn no_due_date_is_never_overdue() {
        let task = base_task();
        assert!(!task.is_overdue(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()));
    }

    #[test]
    fn completed_task_is_never_overdue() {
        let mut task = base_task();
        task.due = NaiveDate::from_ymd_opt(2020, 1, 1);
        task.status = Status::Completed;
        assert!(!task.is_overdue(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()));
    }

    #[test]
    fn cancelled_task_is_never_overdue() {
        let mut task = base_task();
        task.due = NaiveDate::from_ymd_opt(2020, 1, 1);
        task.status = Status::Cancelled;
        assert!(!task.is_overdue(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()));
    }

    #[test]
    fn past_due_pending_task_reads_overdue() {
        let mut task = base_task();
        task.due = NaiveDate::from_ymd_opt(2025, 1, 2);
        let today = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        assert!(task.is_overdue(today));
        assert_eq!(task.effective_status(today), Status::Overdue);
        // Due today is not overdue yet.
        assert!(!task.is_overdue(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()));
    }

    #[test]
    fn completion_hours_needs_both_stamps() {
        let mut task = base_task();
        assert_eq!(task.completion_hours(), None);
        task.completed_at = Some(Utc.with_ymd_and_hms(2025, 1, 1, 14, 0, 0).unwrap());
        assert_eq!(task.completion_hours(), Some(6.0));
    }
}
