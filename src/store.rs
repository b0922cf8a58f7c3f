//! Key-value store collaborator and the task store adapter.
//!
//! Tasks are persisted as flat string hashes under `task:{property}:{id}`
//! keys, with list- and object-valued sub-fields JSON-encoded inside the
//! hash and dates as ISO strings. The adapter is the only place that sees
//! that encoding; every engine above it works with typed [`Task`] values.
//!
//! Per-property membership sets (`property:{id}:tasks`) drive enumeration.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::fields::{Category, Priority, Status};
use crate::task::{RecurrencePattern, Task};

/// A stored record: field name to string value.
pub type Hash = BTreeMap<String, String>;

/// The storage collaborator. String keys, hash values, membership sets.
/// Read-your-writes, no transactions spanning keys.
pub trait Kv {
    fn get(&self, key: &str) -> Option<Hash>;
    fn set(&mut self, key: &str, fields: Hash);
    /// Keys matching a pattern; only trailing-`*` prefix patterns are used.
    fn keys(&self, pattern: &str) -> Vec<String>;
    fn members(&self, set_key: &str) -> BTreeSet<String>;
    fn add_member(&mut self, set_key: &str, member: &str);
}

/// In-memory store. Backs tests and the file store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    hashes: BTreeMap<String, Hash>,
    sets: BTreeMap<String, BTreeSet<String>>,
}

impl Kv for MemoryStore {
    fn get(&self, key: &str) -> Option<Hash> {
        self.hashes.get(key).cloned()
    }

    fn set(&mut self, key: &str, fields: Hash) {
        self.hashes.insert(key.to_string(), fields);
    }

    fn keys(&self, pattern: &str) -> Vec<String> {
        let prefix = pattern.strip_suffix('*').unwrap_or(pattern);
        self.hashes
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn members(&self, set_key: &str) -> BTreeSet<String> {
        self.sets.get(set_key).cloned().unwrap_or_default()
    }

    fn add_member(&mut self, set_key: &str, member: &str) {
        self.sets
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string());
    }
}

/// JSON-file-backed store. Loaded whole at startup, saved after mutations
/// using an atomic temp-file-and-rename write.
#[derive(Debug)]
pub struct FileStore {
    mem: MemoryStore,
    path: PathBuf,
}

impl FileStore {
    /// Load the store from a JSON file, starting empty if the file does not
    /// exist or cannot be parsed.
    pub fn load(path: &Path) -> Self {
        let mem = if path.exists() {
            let mut buf = String::new();
            match File::open(path).and_then(|mut f| f.read_to_string(&mut buf)) {
                Ok(_) => match serde_json::from_str(&buf) {
                    Ok(mem) => mem,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "store file unreadable, starting fresh");
                        MemoryStore::default()
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "store file unreadable, starting fresh");
                    MemoryStore::default()
                }
            }
        } else {
            MemoryStore::default()
        };
        FileStore {
            mem,
            path: path.to_path_buf(),
        }
    }

    /// Persist the store to its file via temp + rename.
    pub fn save(&self) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        let data = serde_json::to_string_pretty(&self.mem).expect("store serializes");
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Kv for FileStore {
    fn get(&self, key: &str) -> Option<Hash> {
        self.mem.get(key)
    }

    fn set(&mut self, key: &str, fields: Hash) {
        self.mem.set(key, fields);
    }

    fn keys(&self, pattern: &str) -> Vec<String> {
        self.mem.keys(pattern)
    }

    fn members(&self, set_key: &str) -> BTreeSet<String> {
        self.mem.members(set_key)
    }

    fn add_member(&mut self, set_key: &str, member: &str) {
        self.mem.add_member(set_key, member);
    }
}

pub fn task_key(property_id: &str, task_id: &str) -> String {
    format!("task:{}:{}", property_id, task_id)
}

pub fn property_tasks_key(property_id: &str) -> String {
    format!("property:{}:tasks", property_id)
}

/// Typed view over the key-value collaborator. Owns the encoding.
pub struct TaskStore<K> {
    kv: K,
}

impl<K: Kv> TaskStore<K> {
    pub fn new(kv: K) -> Self {
        TaskStore { kv }
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn kv_mut(&mut self) -> &mut K {
        &mut self.kv
    }

    /// Load a task. `NotFound` covers both a missing key and a soft-deleted
    /// record; `Corrupt` means the hash exists but cannot be decoded.
    pub fn load_task(&self, property_id: &str, task_id: &str) -> Result<Task> {
        let key = task_key(property_id, task_id);
        let hash = self
            .kv
            .get(&key)
            .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))?;
        let task = decode_task(&key, &hash)?;
        if task.deleted_at.is_some() {
            return Err(Error::NotFound(format!("task {}", task_id)));
        }
        Ok(task)
    }

    /// Write a task hash, stamping `updated_at` with the supplied clock
    /// value and registering the id in the property's membership set.
    pub fn save_task(&mut self, task: &mut Task, now: DateTime<Utc>) -> Result<()> {
        task.updated_at = now;
        let key = task_key(&task.property_id, &task.id);
        self.kv.set(&key, encode_task(task));
        self.kv
            .add_member(&property_tasks_key(&task.property_id), &task.id);
        Ok(())
    }

    /// All live tasks for a property, fully materialized. Soft-deleted
    /// records are dropped; a corrupt record logs a warning and is skipped
    /// so one bad row never fails a listing or aggregation.
    pub fn list_property_tasks(&self, property_id: &str) -> Vec<Task> {
        let mut tasks = Vec::new();
        for id in self.kv.members(&property_tasks_key(property_id)) {
            match self.load_task(property_id, &id) {
                Ok(task) => tasks.push(task),
                Err(Error::NotFound(_)) => {} // soft-deleted
                Err(e) => warn!(task = %id, property = %property_id, error = %e, "skipping unreadable task"),
            }
        }
        tasks
    }
}

pub fn format_category(c: Category) -> &'static str {
    match c {
        Category::Cleaning => "cleaning",
        Category::Maintenance => "maintenance",
        Category::Administrative => "administrative",
        Category::Inspection => "inspection",
        Category::Emergency => "emergency",
        Category::Other => "other",
    }
}

pub fn parse_category(s: &str) -> Option<Category> {
    match s.to_lowercase().as_str() {
        "cleaning" => Some(Category::Cleaning),
        "maintenance" => Some(Category::Maintenance),
        "administrative" => Some(Category::Administrative),
        "inspection" => Some(Category::Inspection),
        "emergency" => Some(Category::Emergency),
        "other" => Some(Category::Other),
        _ => None,
    }
}

pub fn format_priority(p: Priority) -> &'static str {
    match p {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
        Priority::Critical => "critical",
    }
}

pub fn parse_priority(s: &str) -> Option<Priority> {
    match s.to_lowercase().as_str() {
        "low" => Some(Priority::Low),
        "medium" => Some(Priority::Medium),
        "high" => Some(Priority::High),
        "critical" => Some(Priority::Critical),
        _ => None,
    }
}

pub fn format_status(s: Status) -> &'static str {
    match s {
        Status::Pending => "pending",
        Status::InProgress => "in-progress",
        Status::Completed => "completed",
        Status::Overdue => "overdue",
        Status::Cancelled => "cancelled",
    }
}

pub fn parse_status(s: &str) -> Option<Status> {
    match s.to_lowercase().as_str() {
        "pending" => Some(Status::Pending),
        "in-progress" | "in_progress" => Some(Status::InProgress),
        "completed" => Some(Status::Completed),
        "overdue" => Some(Status::Overdue),
        "cancelled" => Some(Status::Cancelled),
        _ => None,
    }
}

/// Serialize a task into its stored hash form.
pub fn encode_task(task: &Task) -> Hash {
    let mut h = Hash::new();
    h.insert("id".into(), task.id.clone());
    h.insert("property_id".into(), task.property_id.clone());
    h.insert("title".into(), task.title.clone());
    if let Some(ref d) = task.description {
        h.insert("description".into(), d.clone());
    }
    if let Some(ref i) = task.instructions {
        h.insert("instructions".into(), i.clone());
    }
    h.insert("category".into(), format_category(task.category).into());
    h.insert("priority".into(), format_priority(task.priority).into());
    h.insert("status".into(), format_status(task.status).into());
    h.insert(
        "assigned_to".into(),
        serde_json::to_string(&task.assigned_to).expect("string list serializes"),
    );
    if let Some(due) = task.due {
        h.insert("due".into(), due.format("%Y-%m-%d").to_string());
    }
    if let Some(mins) = task.estimated_minutes {
        h.insert("estimated_minutes".into(), mins.to_string());
    }
    if let Some(ref rec) = task.recurrence {
        h.insert(
            "recurrence".into(),
            serde_json::to_string(rec).expect("pattern serializes"),
        );
    }
    if let Some(at) = task.completed_at {
        h.insert("completed_at".into(), at.to_rfc3339());
    }
    if let Some(ref by) = task.completed_by {
        h.insert("completed_by".into(), by.clone());
    }
    if let Some(ref notes) = task.completion_notes {
        h.insert("completion_notes".into(), notes.clone());
    }
    if let Some(rating) = task.quality_rating {
        h.insert("quality_rating".into(), rating.to_string());
    }
    h.insert(
        "completion_photos".into(),
        serde_json::to_string(&task.completion_photos).expect("string list serializes"),
    );
    h.insert("created_at".into(), task.created_at.to_rfc3339());
    h.insert("updated_at".into(), task.updated_at.to_rfc3339());
    if let Some(at) = task.deleted_at {
        h.insert("deleted_at".into(), at.to_rfc3339());
    }
    h
}

fn corrupt(key: &str, reason: impl Into<String>) -> Error {
    Error::Corrupt {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required<'a>(key: &str, hash: &'a Hash, field: &str) -> Result<&'a String> {
    hash.get(field)
        .ok_or_else(|| corrupt(key, format!("missing field {}", field)))
}

fn parse_stamp(key: &str, field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(key, format!("bad {} timestamp: {}", field, e)))
}

/// Decode a stored hash into a typed task. Any malformed sub-field is a
/// `Corrupt` error naming the key.
pub fn decode_task(key: &str, hash: &Hash) -> Result<Task> {
    let id = required(key, hash, "id")?.clone();
    let property_id = required(key, hash, "property_id")?.clone();
    let title = required(key, hash, "title")?.clone();

    let category = parse_category(required(key, hash, "category")?)
        .ok_or_else(|| corrupt(key, "unknown category"))?;
    let priority = parse_priority(required(key, hash, "priority")?)
        .ok_or_else(|| corrupt(key, "unknown priority"))?;
    let status = parse_status(required(key, hash, "status")?)
        .ok_or_else(|| corrupt(key, "unknown status"))?;

    let assigned_to: Vec<String> = serde_json::from_str(required(key, hash, "assigned_to")?)
        .map_err(|e| corrupt(key, format!("bad assigned_to: {}", e)))?;
    let completion_photos: Vec<String> = match hash.get("completion_photos") {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| corrupt(key, format!("bad completion_photos: {}", e)))?,
        None => Vec::new(),
    };
    let recurrence: Option<RecurrencePattern> = match hash.get("recurrence") {
        Some(raw) => Some(
            serde_json::from_str(raw).map_err(|e| corrupt(key, format!("bad recurrence: {}", e)))?,
        ),
        None => None,
    };

    let due = match hash.get("due") {
        Some(raw) => Some(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| corrupt(key, format!("bad due date: {}", e)))?,
        ),
        None => None,
    };

    let estimated_minutes = match hash.get("estimated_minutes") {
        Some(raw) => Some(
            raw.parse::<u32>()
                .map_err(|e| corrupt(key, format!("bad estimated_minutes: {}", e)))?,
        ),
        None => None,
    };
    let quality_rating = match hash.get("quality_rating") {
        Some(raw) => Some(
            raw.parse::<u8>()
                .map_err(|e| corrupt(key, format!("bad quality_rating: {}", e)))?,
        ),
        None => None,
    };

    let created_at = parse_stamp(key, "created_at", required(key, hash, "created_at")?)?;
    let updated_at = parse_stamp(key, "updated_at", required(key, hash, "updated_at")?)?;
    let completed_at = match hash.get("completed_at") {
        Some(raw) => Some(parse_stamp(key, "completed_at", raw)?),
        None => None,
    };
    let deleted_at = match hash.get("deleted_at") {
        Some(raw) => Some(parse_stamp(key, "deleted_at", raw)?),
        None => None,
    };

    Ok(Task {
        id,
        property_id,
        title,
        description: hash.get("description").cloned(),
        instructions: hash.get("instructions").cloned(),
        category,
        priority,
        status,
        assigned_to,
        due,
        estimated_minutes,
        recurrence,
        completed_at,
        completed_by: hash.get("completed_by").cloned(),
        completion_notes: hash.get("completion_notes").cloned(),
        quality_rating,
        completion_photos,
        created_at,
        updated_at,
        deleted_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::RecurrenceKind;
    use chrono::TimeZone;

    fn sample_task(now: DateTime<Utc>) -> Task {
        let mut task = Task::new(
            "t1".into(),
            "casa-verde".into(),
            "Deep clean common room".into(),
            Category::Cleaning,
            Priority::High,
            now,
        );
        task.description = Some("Vacuum, mop, windows".into());
        task.assigned_to = vec!["ana".into(), "bo".into()];
        task.due = NaiveDate::from_ymd_opt(2025, 2, 1);
        task.estimated_minutes = Some(90);
        task.recurrence = Some(RecurrencePattern {
            kind: RecurrenceKind::Weekly,
            interval: 1,
            days_of_week: None,
            end_date: None,
            assignment_rotation: true,
        });
        task
    }

    #[test]
    fn round_trip_preserves_fields_and_advances_updated_at() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 1, 10, 9, 5, 0).unwrap();
        let mut store = TaskStore::new(MemoryStore::default());
        let mut task = sample_task(t0);
        store.save_task(&mut task, t0).unwrap();

        let mut loaded = store.load_task("casa-verde", "t1").unwrap();
        assert_eq!(loaded, task);

        store.save_task(&mut loaded, t1).unwrap();
        let reloaded = store.load_task("casa-verde", "t1").unwrap();
        assert_eq!(reloaded.updated_at, t1);
        assert!(reloaded.updated_at > task.created_at);
        // Everything except the stamp survives untouched.
        assert_eq!(reloaded.title, task.title);
        assert_eq!(reloaded.assigned_to, task.assigned_to);
        assert_eq!(reloaded.recurrence, task.recurrence);
        assert_eq!(reloaded.due, task.due);
    }

    #[test]
    fn soft_deleted_task_is_not_found() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        let mut store = TaskStore::new(MemoryStore::default());
        let mut task = sample_task(now);
        task.deleted_at = Some(now);
        store.save_task(&mut task, now).unwrap();

        assert!(matches!(
            store.load_task("casa-verde", "t1"),
            Err(Error::NotFound(_))
        ));
        assert!(store.list_property_tasks("casa-verde").is_empty());
    }

    #[test]
    fn corrupt_record_is_skipped_in_listing() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        let mut store = TaskStore::new(MemoryStore::default());
        let mut good = sample_task(now);
        store.save_task(&mut good, now).unwrap();

        // A second record with mangled embedded JSON.
        let mut bad = encode_task(&sample_task(now));
        bad.insert("id".into(), "t2".into());
        bad.insert("assigned_to".into(), "{not json".into());
        store.kv_mut().set(&task_key("casa-verde", "t2"), bad);
        store
            .kv_mut()
            .add_member(&property_tasks_key("casa-verde"), "t2");

        let listed = store.list_property_tasks("casa-verde");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "t1");

        // Loading it directly reports corruption, not absence.
        assert!(matches!(
            store.load_task("casa-verde", "t2"),
            Err(Error::Corrupt { .. })
        ));
    }

    #[test]
    fn file_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();

        {
            let mut store = TaskStore::new(FileStore::load(&path));
            let mut task = sample_task(now);
            store.save_task(&mut task, now).unwrap();
            store.kv().save().unwrap();
        }

        let store = TaskStore::new(FileStore::load(&path));
        let loaded = store.load_task("casa-verde", "t1").unwrap();
        assert_eq!(loaded.title, "Deep clean common room");
        assert_eq!(loaded.assigned_to, vec!["ana".to_string(), "bo".to_string()]);
    }

    #[test]
    fn file_store_starts_fresh_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json at all").unwrap();
        let store = FileStore::load(&path);
        assert!(store.keys("task:*").is_empty());
    }

    #[test]
    fn prefix_key_matching() {
        let mut kv = MemoryStore::default();
        kv.set("task:p1:a", Hash::new());
        kv.set("task:p1:b", Hash::new());
        kv.set("task:p2:c", Hash::new());
        assert_eq!(kv.keys("task:p1:*").len(), 2);
        assert_eq!(kv.keys("task:*").len(), 3);
    }
}
