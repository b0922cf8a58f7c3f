//! Enumerations and field types for property task management.
//!
//! This module defines the structured data types used to categorise and
//! schedule tasks: work categories, priorities, recurrence kinds, status
//! values and the status transition rules.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Operational work categories for a property.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    #[serde(alias = "Cleaning")]
    Cleaning,
    #[serde(alias = "Maintenance")]
    Maintenance,
    #[serde(alias = "Administrative")]
    Administrative,
    #[serde(alias = "Inspection")]
    Inspection,
    #[serde(alias = "Emergency")]
    Emergency,
    #[serde(alias = "Other")]
    Other,
}

impl Category {
    /// Every category value, in display order. Aggregations must cover all
    /// of these even when no task carries them.
    pub const ALL: [Category; 6] = [
        Category::Cleaning,
        Category::Maintenance,
        Category::Administrative,
        Category::Inspection,
        Category::Emergency,
        Category::Other,
    ];
}

/// Priority classification, ordered. Critical outranks everything.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Numeric rank used by the canonical sort: Critical=4 down to Low=1.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Critical => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

/// Task status.
///
/// `Overdue` can appear in stored records (older writers persisted it) but
/// no transition targets it; the overdue condition is derived at read time
/// from the due date. See [`crate::task::Task::is_overdue`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[serde(alias = "Pending")]
    Pending,
    #[serde(alias = "InProgress")]
    InProgress,
    #[serde(alias = "Completed")]
    Completed,
    #[serde(alias = "Overdue")]
    Overdue,
    #[serde(alias = "Cancelled")]
    Cancelled,
}

impl Status {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Cancelled)
    }

    /// Whether an explicit transition from `self` to `to` is allowed.
    ///
    /// Pending -> {InProgress, Completed, Cancelled};
    /// InProgress -> {Completed, Cancelled}. A stored `Overdue` behaves
    /// like Pending here. `Overdue` is never a valid target.
    pub fn can_transition(self, to: Status) -> bool {
        if to == Status::Overdue {
            return false;
        }
        match self {
            Status::Pending | Status::Overdue => {
                matches!(to, Status::InProgress | Status::Completed | Status::Cancelled)
            }
            Status::InProgress => matches!(to, Status::Completed | Status::Cancelled),
            Status::Completed | Status::Cancelled => false,
        }
    }
}

/// Recurrence rule kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

/// Available sorting options for task lists.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortKey {
    Due,
    Priority,
    Created,
}

/// Filtering options for tasks based on due dates.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DueFilter {
    Today,
    ThisWeek,
    Overdue,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_reject_all_transitions() {
        for to in [
            Status::Pending,
            Status::InProgress,
            Status::Completed,
            Status::Overdue,
            Status::Cancelled,
        ] {
            assert!(!Status::Completed.can_transition(to));
            assert!(!Status::Cancelled.can_transition(to));
        }
    }

    #[test]
    fn pending_transitions() {
        assert!(Status::Pending.can_transition(Status::InProgress));
        assert!(Status::Pending.can_transition(Status::Completed));
        assert!(Status::Pending.can_transition(Status::Cancelled));
        assert!(!Status::Pending.can_transition(Status::Overdue));
    }

    #[test]
    fn stored_overdue_behaves_like_pending() {
        assert!(Status::Overdue.can_transition(Status::InProgress));
        assert!(Status::Overdue.can_transition(Status::Completed));
        assert!(!Status::Overdue.can_transition(Status::Overdue));
    }

    #[test]
    fn priority_ranks_are_ordered() {
        assert!(Priority::Critical.rank() > Priority::High.rank());
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
    }
}
