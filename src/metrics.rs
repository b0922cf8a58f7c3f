//! Aggregation engine: read-only derived views over a task collection.
//!
//! Nothing in here mutates a task or touches the store; every function
//! works over an already materialized list and takes the current date or
//! time explicitly so results are deterministic under test.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::fields::{Category, Status};
use crate::task::Task;

/// Count of tasks read as overdue.
///
/// Mirrors the legacy formula: a stored `Overdue` status counts, and so
/// does any non-completed task whose due date has passed. Note this is
/// deliberately looser than [`Task::is_overdue`] (a cancelled task with a
/// past due date still counts here).
pub fn overdue_count(tasks: &[Task], today: NaiveDate) -> usize {
    tasks
        .iter()
        .filter(|t| {
            t.status == Status::Overdue
                || (t.due.is_some_and(|d| d < today) && t.status != Status::Completed)
        })
        .count()
}

/// Tasks completed inside the inclusive window.
pub fn completed_in_window(tasks: &[Task], start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
    tasks
        .iter()
        .filter(|t| {
            t.status == Status::Completed
                && t.completed_at.is_some_and(|at| at >= start && at <= end)
        })
        .count()
}

/// Not-yet-completed tasks due within the horizon, soonest first.
pub fn upcoming_deadlines<'a>(
    tasks: &'a [Task],
    today: NaiveDate,
    horizon_days: i64,
    limit: usize,
) -> Vec<&'a Task> {
    let end = today + Duration::days(horizon_days);
    let mut upcoming: Vec<&Task> = tasks
        .iter()
        .filter(|t| {
            t.status != Status::Completed && t.due.is_some_and(|d| d >= today && d <= end)
        })
        .collect();
    upcoming.sort_by_key(|t| t.due.unwrap_or(NaiveDate::MAX));
    upcoming.truncate(limit);
    upcoming
}

/// Open (not completed, not cancelled) task count per category. Every
/// category variant gets an entry, zero counts included.
pub fn workload_by_category(tasks: &[Task]) -> BTreeMap<Category, usize> {
    let mut counts: BTreeMap<Category, usize> = Category::ALL.iter().map(|&c| (c, 0)).collect();
    for t in tasks {
        if !t.status.is_terminal() {
            *counts.entry(t.category).or_default() += 1;
        }
    }
    counts
}

/// Bounded 0-100 composite score for one user's assigned tasks:
/// completion rate, minus up to 30 points of overdue penalty (10 per
/// overdue task), plus up to 20 points of recent-activity bonus (2 per
/// completion in the trailing seven days).
pub fn productivity_score(assigned: &[Task], now: DateTime<Utc>) -> u8 {
    let today = now.date_naive();
    let total = assigned.len();
    let completed = assigned
        .iter()
        .filter(|t| t.status == Status::Completed)
        .count();
    let completion_rate = if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    };

    let overdue = assigned.iter().filter(|t| t.is_overdue(today)).count();
    let overdue_penalty = (overdue * 10).min(30) as f64;

    let week_ago = now - Duration::days(7);
    let completed_this_week = completed_in_window(assigned, week_ago, now);
    let recent_activity_bonus = (completed_this_week * 2).min(20) as f64;

    (completion_rate - overdue_penalty + recent_activity_bonus)
        .clamp(0.0, 100.0)
        .round() as u8
}

/// Per-assignee rollup.
#[derive(Debug, Clone, PartialEq)]
pub struct UserMetrics {
    pub total: usize,
    pub completed: usize,
    /// Percent of assigned tasks completed; 0 when none assigned.
    pub completion_rate: f64,
    /// Mean hours from creation to completion over tasks carrying both
    /// stamps; 0 when none do.
    pub avg_completion_hours: f64,
    pub overdue: usize,
    /// Mean quality rating over rated completions; 0 when none rated.
    pub avg_quality_rating: f64,
}

/// Group tasks by assignee. A task with several assignees contributes to
/// each of their rollups.
pub fn user_metrics(tasks: &[Task], today: NaiveDate) -> BTreeMap<String, UserMetrics> {
    let mut grouped: BTreeMap<String, Vec<&Task>> = BTreeMap::new();
    for t in tasks {
        for user in &t.assigned_to {
            grouped.entry(user.clone()).or_default().push(t);
        }
    }

    grouped
        .into_iter()
        .map(|(user, assigned)| {
            let total = assigned.len();
            let completed = assigned
                .iter()
                .filter(|t| t.status == Status::Completed)
                .count();
            let completion_rate = if total == 0 {
                0.0
            } else {
                completed as f64 / total as f64 * 100.0
            };
            let hours: Vec<f64> = assigned.iter().filter_map(|t| t.completion_hours()).collect();
            let avg_completion_hours = if hours.is_empty() {
                0.0
            } else {
                hours.iter().sum::<f64>() / hours.len() as f64
            };
            let overdue = assigned.iter().filter(|t| t.is_overdue(today)).count();
            let ratings: Vec<f64> = assigned
                .iter()
                .filter(|t| t.status == Status::Completed)
                .filter_map(|t| t.quality_rating.map(|r| r as f64))
                .collect();
            let avg_quality_rating = if ratings.is_empty() {
                0.0
            } else {
                ratings.iter().sum::<f64>() / ratings.len() as f64
            };
            (
                user,
                UserMetrics {
                    total,
                    completed,
                    completion_rate,
                    avg_completion_hours,
                    overdue,
                    avg_quality_rating,
                },
            )
        })
        .collect()
}

/// Per-category rollup.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMetrics {
    pub total: usize,
    pub completed: usize,
    pub avg_completion_hours: f64,
    /// Percent of the category's tasks currently overdue; 0 when empty.
    pub overdue_rate: f64,
}

pub fn category_metrics(tasks: &[Task], today: NaiveDate) -> BTreeMap<Category, CategoryMetrics> {
    let mut out = BTreeMap::new();
    for &category in &Category::ALL {
        let in_cat: Vec<&Task> = tasks.iter().filter(|t| t.category == category).collect();
        let total = in_cat.len();
        let completed = in_cat
            .iter()
            .filter(|t| t.status == Status::Completed)
            .count();
        let hours: Vec<f64> = in_cat.iter().filter_map(|t| t.completion_hours()).collect();
        let avg_completion_hours = if hours.is_empty() {
            0.0
        } else {
            hours.iter().sum::<f64>() / hours.len() as f64
        };
        let overdue = in_cat.iter().filter(|t| t.is_overdue(today)).count();
        let overdue_rate = if total == 0 {
            0.0
        } else {
            overdue as f64 / total as f64 * 100.0
        };
        out.insert(
            category,
            CategoryMetrics {
                total,
                completed,
                avg_completion_hours,
                overdue_rate,
            },
        );
    }
    out
}

/// One day of the trailing productivity trend.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub completed: usize,
    pub created: usize,
    pub avg_completion_hours: f64,
}

/// Daily completion/creation counts over the trailing `days` calendar
/// days, oldest first.
pub fn productivity_trends(tasks: &[Task], today: NaiveDate, days: u32) -> Vec<TrendPoint> {
    (0..days as i64)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            let completed_today: Vec<&Task> = tasks
                .iter()
                .filter(|t| t.completed_at.is_some_and(|at| at.date_naive() == date))
                .collect();
            let created = tasks
                .iter()
                .filter(|t| t.created_at.date_naive() == date)
                .count();
            let hours: Vec<f64> = completed_today
                .iter()
                .filter_map(|t| t.completion_hours())
                .collect();
            let avg_completion_hours = if hours.is_empty() {
                0.0
            } else {
                hours.iter().sum::<f64>() / hours.len() as f64
            };
            TrendPoint {
                date,
                completed: completed_today.len(),
                created,
                avg_completion_hours,
            }
        })
        .collect()
}

/// A search match: the task, which fields matched, and a flat relevance
/// score (this is a substring filter, not a ranking algorithm).
#[derive(Debug)]
pub struct SearchHit<'a> {
    pub task: &'a Task,
    pub score: f64,
    pub matched_fields: Vec<&'static str>,
}

/// Case-insensitive substring search over title, description and
/// instructions, truncated to `limit`.
pub fn search<'a>(tasks: &'a [Task], query: &str, limit: usize) -> Vec<SearchHit<'a>> {
    let needle = query.to_lowercase();
    let mut hits = Vec::new();
    for task in tasks {
        if hits.len() >= limit {
            break;
        }
        let mut matched_fields = Vec::new();
        if task.title.to_lowercase().contains(&needle) {
            matched_fields.push("title");
        }
        if task
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&needle))
        {
            matched_fields.push("description");
        }
        if task
            .instructions
            .as_deref()
            .is_some_and(|i| i.to_lowercase().contains(&needle))
        {
            matched_fields.push("instructions");
        }
        if !matched_fields.is_empty() {
            hits.push(SearchHit {
                task,
                score: 1.0,
                matched_fields,
            });
        }
    }
    hits
}

/// Canonical task ordering: priority descending, then due date ascending
/// with missing dates last, then creation time descending.
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    b.priority
        .rank()
        .cmp(&a.priority.rank())
        .then_with(|| {
            a.due
                .unwrap_or(NaiveDate::MAX)
                .cmp(&b.due.unwrap_or(NaiveDate::MAX))
        })
        .then_with(|| b.created_at.cmp(&a.created_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Priority;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn at(y: i32, m: u32, day: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, day, h, 0, 0).unwrap()
    }

    fn task(id: &str, category: Category, priority: Priority) -> Task {
        Task::new(
            id.into(),
            "prop".into(),
            format!("task {}", id),
            category,
            priority,
            at(2025, 1, 1, 8),
        )
    }

    fn completed(id: &str, created: DateTime<Utc>, done: DateTime<Utc>) -> Task {
        let mut t = task(id, Category::Cleaning, Priority::Medium);
        t.created_at = created;
        t.status = Status::Completed;
        t.completed_at = Some(done);
        t
    }

    #[test]
    fn overdue_count_uses_legacy_formula() {
        let today = d(2025, 2, 1);
        let mut stored_overdue = task("a", Category::Other, Priority::Low);
        stored_overdue.status = Status::Overdue;
        let mut past_due = task("b", Category::Other, Priority::Low);
        past_due.due = Some(d(2025, 1, 1));
        let mut past_due_completed = task("c", Category::Other, Priority::Low);
        past_due_completed.due = Some(d(2025, 1, 1));
        past_due_completed.status = Status::Completed;
        // Cancelled with a past due date still counts under the legacy formula.
        let mut past_due_cancelled = task("d", Category::Other, Priority::Low);
        past_due_cancelled.due = Some(d(2025, 1, 1));
        past_due_cancelled.status = Status::Cancelled;

        let tasks = vec![stored_overdue, past_due, past_due_completed, past_due_cancelled];
        assert_eq!(overdue_count(&tasks, today), 3);
    }

    #[test]
    fn workload_covers_every_category() {
        let counts = workload_by_category(&[]);
        assert_eq!(counts.len(), Category::ALL.len());
        assert!(counts.values().all(|&c| c == 0));

        let mut done = task("a", Category::Cleaning, Priority::Low);
        done.status = Status::Completed;
        let open = task("b", Category::Cleaning, Priority::Low);
        let counts = workload_by_category(&[done, open]);
        assert_eq!(counts[&Category::Cleaning], 1);
        assert_eq!(counts[&Category::Emergency], 0);
    }

    #[test]
    fn productivity_score_stays_in_bounds() {
        let now = at(2025, 2, 1, 12);
        assert_eq!(productivity_score(&[], now), 0);

        // All overdue, nothing completed: clamps at 0.
        let mut overdue_tasks = Vec::new();
        for i in 0..5 {
            let mut t = task(&format!("o{}", i), Category::Other, Priority::Low);
            t.due = Some(d(2025, 1, 1));
            overdue_tasks.push(t);
        }
        assert_eq!(productivity_score(&overdue_tasks, now), 0);

        // Everything completed this week: 100 + bonus clamps at 100.
        let mut done_tasks = Vec::new();
        for i in 0..15 {
            done_tasks.push(completed(
                &format!("c{}", i),
                at(2025, 1, 30, 8),
                at(2025, 1, 31, 8),
            ));
        }
        assert_eq!(productivity_score(&done_tasks, now), 100);
    }

    #[test]
    fn productivity_score_applies_penalty_and_bonus() {
        let now = at(2025, 2, 1, 12);
        // 1 of 2 completed long ago (rate 50), 1 overdue (penalty 10).
        let old_done = completed("done", at(2024, 6, 1, 8), at(2024, 6, 2, 8));
        let mut late = task("late", Category::Other, Priority::Low);
        late.due = Some(d(2025, 1, 1));
        assert_eq!(productivity_score(&[old_done.clone(), late.clone()], now), 40);

        // Same, but the completion was three days ago: +2 bonus.
        let recent_done = completed("done", at(2025, 1, 28, 8), at(2025, 1, 29, 8));
        assert_eq!(productivity_score(&[recent_done, late], now), 42);
    }

    #[test]
    fn user_metrics_groups_by_every_assignee() {
        let today = d(2025, 2, 1);
        let mut shared = completed("s", at(2025, 1, 1, 8), at(2025, 1, 1, 20));
        shared.assigned_to = vec!["ana".into(), "bo".into()];
        shared.quality_rating = Some(4);
        let mut solo = task("t", Category::Other, Priority::Low);
        solo.assigned_to = vec!["ana".into()];
        solo.due = Some(d(2025, 1, 15));

        let metrics = user_metrics(&[shared, solo], today);
        assert_eq!(metrics.len(), 2);
        let ana = &metrics["ana"];
        assert_eq!(ana.total, 2);
        assert_eq!(ana.completed, 1);
        assert_eq!(ana.completion_rate, 50.0);
        assert_eq!(ana.overdue, 1);
        assert_eq!(ana.avg_completion_hours, 12.0);
        assert_eq!(ana.avg_quality_rating, 4.0);
        let bo = &metrics["bo"];
        assert_eq!(bo.total, 1);
        assert_eq!(bo.completion_rate, 100.0);
    }

    #[test]
    fn category_metrics_handles_empty_categories() {
        let today = d(2025, 2, 1);
        let metrics = category_metrics(&[], today);
        assert_eq!(metrics.len(), Category::ALL.len());
        assert_eq!(metrics[&Category::Cleaning].overdue_rate, 0.0);
        assert_eq!(metrics[&Category::Cleaning].avg_completion_hours, 0.0);
    }

    #[test]
    fn trends_run_oldest_first() {
        let today = d(2025, 1, 10);
        let done = completed("a", at(2025, 1, 9, 8), at(2025, 1, 9, 14));
        let trend = productivity_trends(&[done], today, 3);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0].date, d(2025, 1, 8));
        assert_eq!(trend[2].date, d(2025, 1, 10));
        assert_eq!(trend[1].completed, 1);
        assert_eq!(trend[1].avg_completion_hours, 6.0);
        assert_eq!(trend[2].completed, 0);
    }

    #[test]
    fn search_matches_title_case_insensitively() {
        let mut kitchen = task("a", Category::Cleaning, Priority::Low);
        kitchen.title = "Clean Kitchen".into();
        let mut faucet = task("b", Category::Maintenance, Priority::Low);
        faucet.title = "Fix Faucet".into();

        let tasks = vec![kitchen, faucet];
        let hits = search(&tasks, "kitchen", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].task.id, "a");
        assert!(hits[0].matched_fields.contains(&"title"));
    }

    #[test]
    fn search_respects_limit() {
        let tasks: Vec<Task> = (0..5)
            .map(|i| {
                let mut t = task(&format!("t{}", i), Category::Other, Priority::Low);
                t.title = "shared word".into();
                t
            })
            .collect();
        assert_eq!(search(&tasks, "shared", 3).len(), 3);
    }

    #[test]
    fn canonical_ordering() {
        let mut critical = task("crit", Category::Other, Priority::Critical);
        critical.due = Some(d(2025, 6, 1));
        let mut high_soon = task("soon", Category::Other, Priority::High);
        high_soon.due = Some(d(2025, 1, 5));
        let high_no_due = task("nodue", Category::Other, Priority::High);

        let mut tasks = vec![high_no_due, high_soon, critical];
        tasks.sort_by(compare_tasks);
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["crit", "soon", "nodue"]);
    }

    #[test]
    fn upcoming_deadlines_window_and_order() {
        let today = d(2025, 1, 10);
        let mut near = task("near", Category::Other, Priority::Low);
        near.due = Some(d(2025, 1, 11));
        let mut far = task("far", Category::Other, Priority::Low);
        far.due = Some(d(2025, 1, 16));
        let mut outside = task("out", Category::Other, Priority::Low);
        outside.due = Some(d(2025, 3, 1));
        let mut done = task("done", Category::Other, Priority::Low);
        done.due = Some(d(2025, 1, 12));
        done.status = Status::Completed;

        let tasks = vec![far, outside, done, near];
        let upcoming = upcoming_deadlines(&tasks, today, 7, 10);
        let ids: Vec<&str> = upcoming.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);
    }
}
