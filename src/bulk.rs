//! Bulk mutation engine: one operation applied across a set of task ids,
//! restricted to the caller's access set.
//!
//! Mutations are atomic per task only. The store offers no multi-key
//! transactions, so a failure partway through leaves earlier tasks
//! updated; the outcome reports how many actually went through.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{Error, Result};
use crate::fields::{Category, Priority, Status};
use crate::session::AccessSet;
use crate::store::{Kv, TaskStore};
use crate::task::Task;

/// The operation to apply, with its strongly-typed payload.
#[derive(Debug, Clone)]
pub enum BulkAction {
    /// Replace the assignee list wholesale (not additive).
    Assign(Vec<String>),
    Priority(Priority),
    Category(Category),
    Deadline(NaiveDate),
    /// Complete on behalf of the acting user.
    Complete,
    Cancel,
}

/// What a bulk run touched.
#[derive(Debug)]
pub struct BulkOutcome {
    pub updated: usize,
    pub tasks: Vec<Task>,
}

/// Apply `action` to every requested task the caller can reach.
///
/// Requested ids outside the access set, soft-deleted, missing or
/// unreadable are silently excluded rather than reported as partial
/// failures. Errors only when the request itself is empty or nothing at
/// all is accessible.
pub fn apply_bulk<K: Kv>(
    store: &mut TaskStore<K>,
    task_ids: &[String],
    action: &BulkAction,
    actor: &str,
    access: &AccessSet,
    now: DateTime<Utc>,
) -> Result<BulkOutcome> {
    if task_ids.is_empty() {
        return Err(Error::EmptyOperation);
    }

    let accessible: Vec<(&String, &String)> = task_ids
        .iter()
        .filter_map(|id| access.get(id).map(|property| (id, property)))
        .collect();
    if accessible.is_empty() {
        return Err(Error::NoAccessibleTasks);
    }

    let mut tasks = Vec::new();
    for (task_id, property_id) in accessible {
        let mut task = match store.load_task(property_id, task_id) {
            Ok(task) => task,
            Err(_) => continue,
        };

        match action {
            BulkAction::Assign(users) => task.assigned_to = users.clone(),
            BulkAction::Priority(priority) => task.priority = *priority,
            BulkAction::Category(category) => task.category = *category,
            BulkAction::Deadline(due) => task.due = Some(*due),
            BulkAction::Complete => {
                task.status = Status::Completed;
                task.completed_at = Some(now);
                task.completed_by = Some(actor.to_string());
            }
            BulkAction::Cancel => task.status = Status::Cancelled,
        }

        if store.save_task(&mut task, now).is_err() {
            continue;
        }
        tasks.push(task);
    }

    Ok(BulkOutcome {
        updated: tasks.len(),
        tasks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn seeded_store() -> (TaskStore<MemoryStore>, AccessSet) {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let mut store = TaskStore::new(MemoryStore::default());
        for id in ["t1", "t2"] {
            let mut task = Task::new(
                id.into(),
                "casa-verde".into(),
                format!("task {}", id),
                Category::Cleaning,
                Priority::Low,
                t0,
            );
            store.save_task(&mut task, t0).unwrap();
        }
        // Caller can only reach t1.
        let mut access = AccessSet::new();
        access.insert("t1".into(), "casa-verde".into());
        (store, access)
    }

    #[test]
    fn empty_request_is_rejected() {
        let (mut store, access) = seeded_store();
        assert!(matches!(
            apply_bulk(&mut store, &[], &BulkAction::Cancel, "ana", &access, now()),
            Err(Error::EmptyOperation)
        ));
    }

    #[test]
    fn fully_inaccessible_request_is_rejected() {
        let (mut store, access) = seeded_store();
        let ids = vec!["t2".to_string(), "ghost".to_string()];
        assert!(matches!(
            apply_bulk(&mut store, &ids, &BulkAction::Cancel, "ana", &access, now()),
            Err(Error::NoAccessibleTasks)
        ));
    }

    #[test]
    fn inaccessible_targets_are_silently_excluded() {
        let (mut store, access) = seeded_store();
        let ids = vec!["t1".to_string(), "t2".to_string()];
        let outcome = apply_bulk(
            &mut store,
            &ids,
            &BulkAction::Priority(Priority::Critical),
            "ana",
            &access,
            now(),
        )
        .unwrap();

        assert_eq!(outcome.updated, 1);
        assert!(outcome.tasks.iter().all(|t| t.id != "t2"));
        assert_eq!(outcome.tasks[0].priority, Priority::Critical);
        assert_eq!(outcome.tasks[0].updated_at, now());
        // t2 untouched.
        let t2 = store.load_task("casa-verde", "t2").unwrap();
        assert_eq!(t2.priority, Priority::Low);
    }

    #[test]
    fn soft_deleted_targets_reduce_the_count() {
        let (mut store, mut access) = seeded_store();
        access.insert("t2".into(), "casa-verde".into());
        let mut t2 = store.load_task("casa-verde", "t2").unwrap();
        t2.deleted_at = Some(now());
        store.save_task(&mut t2, now()).unwrap();

        let ids = vec!["t1".to_string(), "t2".to_string()];
        let outcome =
            apply_bulk(&mut store, &ids, &BulkAction::Cancel, "ana", &access, now()).unwrap();
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.tasks[0].id, "t1");
    }

    #[test]
    fn complete_stamps_completion_metadata() {
        let (mut store, access) = seeded_store();
        let ids = vec!["t1".to_string()];
        let outcome =
            apply_bulk(&mut store, &ids, &BulkAction::Complete, "ana", &access, now()).unwrap();

        let task = &outcome.tasks[0];
        assert_eq!(task.status, Status::Completed);
        assert_eq!(task.completed_at, Some(now()));
        assert_eq!(task.completed_by.as_deref(), Some("ana"));
    }

    #[test]
    fn assign_replaces_wholesale() {
        let (mut store, access) = seeded_store();
        let mut t1 = store.load_task("casa-verde", "t1").unwrap();
        t1.assigned_to = vec!["old".into()];
        store.save_task(&mut t1, now()).unwrap();

        let ids = vec!["t1".to_string()];
        let action = BulkAction::Assign(vec!["ana".into(), "bo".into()]);
        let outcome = apply_bulk(&mut store, &ids, &action, "ana", &access, now()).unwrap();
        assert_eq!(
            outcome.tasks[0].assigned_to,
            vec!["ana".to_string(), "bo".to_string()]
        );
    }

    #[test]
    fn deadline_sets_due_date() {
        let (mut store, access) = seeded_store();
        let due = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let ids = vec!["t1".to_string()];
        let outcome =
            apply_bulk(&mut store, &ids, &BulkAction::Deadline(due), "ana", &access, now())
                .unwrap();
        assert_eq!(outcome.tasks[0].due, Some(due));
    }
}
