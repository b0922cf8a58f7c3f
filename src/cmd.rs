//! Command implementations for the CLI interface.
//!
//! This module contains all the command handlers, from basic task CRUD to
//! bulk mutation, metrics tables and the TUI board.

use clap::Subcommand;
use clap_complete::{generate, Shell};

use std::path::Path;

use chrono::{Local, NaiveDate, Utc};
use uuid::Uuid;

use crate::bulk::{apply_bulk, BulkAction};
use crate::dates::{format_due_relative, parse_due_input, truncate};
use crate::error::Error;
use crate::fields::*;
use crate::metrics;
use crate::recurrence::spawn_next;
use crate::session::{
    access_set, add_manager, list_properties, register_property, Session,
};
use crate::store::{format_category, format_priority, format_status, FileStore, TaskStore};
use crate::task::{RecurrencePattern, Task};
use crate::tui::board_run::run_board_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the interactive status board.
    Board {
        /// Property id. Defaults to the only registered property.
        #[arg(long)]
        property: Option<String>,
    },

    /// Add a new task.
    Add {
        /// Short title for the task.
        title: String,
        /// Property id.
        #[arg(long)]
        property: Option<String>,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Step-by-step instructions for whoever picks it up.
        #[arg(long)]
        instructions: Option<String>,
        /// Work category: cleaning | maintenance | administrative | inspection | emergency | other.
        #[arg(long, value_enum, default_value_t = Category::Other)]
        category: Category,
        /// Priority: low | medium | high | critical.
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Assignee user id. May be repeated; order matters for rotation.
        #[arg(long = "assign")]
        assignees: Vec<String>,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", a weekday, or "in Nd".
        #[arg(long)]
        due: Option<String>,
        /// Estimated effort in minutes.
        #[arg(long)]
        estimate: Option<u32>,
        /// Recurrence: daily | weekly | monthly | custom.
        #[arg(long, value_enum)]
        recur: Option<RecurrenceKind>,
        /// Recurrence interval (every N days/weeks/months).
        #[arg(long, default_value_t = 1)]
        every: u32,
        /// Weekdays for custom recurrence, 0=Sunday..6=Saturday. May be repeated.
        #[arg(long = "on")]
        days_of_week: Vec<u8>,
        /// Last date the series may schedule an occurrence for.
        #[arg(long)]
        until: Option<String>,
        /// Rotate the assignee list on each occurrence.
        #[arg(long)]
        rotate: bool,
    },

    /// List tasks with optional filters.
    List {
        /// Property id.
        #[arg(long)]
        property: Option<String>,
        /// Include completed and cancelled tasks.
        #[arg(long)]
        all: bool,
        /// Filter by (derived) status.
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// Filter by category.
        #[arg(long, value_enum)]
        category: Option<Category>,
        /// Filter by assignee.
        #[arg(long)]
        assignee: Option<String>,
        /// Due filter: today | this-week | overdue | none.
        #[arg(long, value_enum)]
        due: Option<DueFilter>,
        /// Sort key.
        #[arg(long, value_enum, default_value_t = SortKey::Priority)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single task.
    View {
        /// Task id to view.
        id: String,
        #[arg(long)]
        property: Option<String>,
    },

    /// Update fields on a task.
    Update {
        /// Task id to update.
        id: String,
        #[arg(long)]
        property: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long)]
        instructions: Option<String>,
        #[arg(long, value_enum)]
        category: Option<Category>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Replace the assignee list. May be repeated.
        #[arg(long = "assign")]
        assignees: Vec<String>,
        #[arg(long)]
        due: Option<String>,
        /// Clear due date.
        #[arg(long)]
        clear_due: bool,
        /// Move the task through the status machine.
        #[arg(long, value_enum)]
        status: Option<Status>,
    },

    /// Mark a task completed.
    Complete {
        /// Task id to complete.
        id: String,
        #[arg(long)]
        property: Option<String>,
        /// Who did the work.
        #[arg(long)]
        by: Option<String>,
        /// Completion notes.
        #[arg(long)]
        notes: Option<String>,
        /// Quality rating, 1-5.
        #[arg(long)]
        rating: Option<u8>,
        /// Completion photo reference. May be repeated.
        #[arg(long = "photo")]
        photos: Vec<String>,
    },

    /// Cancel a task. Irreversible.
    Cancel {
        /// Task id to cancel.
        id: String,
        #[arg(long)]
        property: Option<String>,
    },

    /// Soft-delete a task: it disappears from listings but stays on disk.
    Delete {
        /// Task id to delete.
        id: String,
        #[arg(long)]
        property: Option<String>,
    },

    /// Apply one operation across many tasks, restricted to the
    /// properties the acting user manages.
    Bulk {
        /// Acting user id.
        #[arg(long = "as")]
        actor: String,
        #[command(subcommand)]
        action: BulkCmd,
    },

    /// Personal summary for one user: open work, overdue count, upcoming
    /// deadlines and productivity score.
    Dashboard {
        /// User id.
        #[arg(long)]
        user: String,
        /// Deadline horizon in days.
        #[arg(long, default_value_t = 7)]
        horizon: i64,
    },

    /// Workload and performance tables.
    Stats {
        #[arg(long)]
        property: Option<String>,
        /// Roll up by: users | categories.
        #[arg(long, value_enum, default_value_t = StatsBy::Users)]
        by: StatsBy,
    },

    /// Daily created/completed counts over a trailing window.
    Trends {
        #[arg(long)]
        property: Option<String>,
        /// Window length in days.
        #[arg(long, default_value_t = 30)]
        days: u32,
    },

    /// Substring search over titles, descriptions and instructions.
    Search {
        /// Query text.
        query: String,
        #[arg(long)]
        property: Option<String>,
        /// Maximum hits returned.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// List registered properties with task counts.
    Properties,

    /// Manage properties.
    Property {
        #[command(subcommand)]
        action: PropertyAction,
    },

    /// Export tasks to CSV format.
    Export {
        #[arg(long)]
        property: Option<String>,
        /// Output file path (default: tasks.csv).
        #[arg(long, short)]
        output: Option<String>,
        /// Include completed and cancelled tasks.
        #[arg(long)]
        all: bool,
    },

    /// Create a timestamped backup of the store file.
    Backup,

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum PropertyAction {
    /// Register a new property.
    Add {
        /// Display name; the id is derived from it.
        name: String,
    },
    /// Grant a user manager access to a property.
    Grant {
        /// Property id.
        property: String,
        /// User id.
        user: String,
    },
}

#[derive(Subcommand)]
pub enum BulkCmd {
    /// Replace the assignee list on each task.
    Assign {
        /// New assignee. May be repeated.
        #[arg(long = "user", required = true)]
        users: Vec<String>,
        /// Task ids.
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Set the priority on each task.
    Priority {
        #[arg(value_enum)]
        value: Priority,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Set the category on each task.
    Category {
        #[arg(value_enum)]
        value: Category,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Set the due date on each task.
    Deadline {
        /// YYYY-MM-DD, "today", "tomorrow", a weekday, or "in Nd".
        date: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Complete each task on behalf of the acting user.
    Complete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Cancel each task.
    Cancel {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum StatsBy {
    Users,
    Categories,
}

/// Pick the property to operate on: the explicit flag, or the only
/// registered property when there is exactly one.
fn resolve_property(store: &TaskStore<FileStore>, flag: Option<String>) -> String {
    if let Some(p) = flag {
        return p;
    }
    let properties = list_properties(store.kv());
    match properties.len() {
        0 => {
            eprintln!("No properties registered. Run `props property add <name>` first.");
            std::process::exit(1);
        }
        1 => properties[0].id.clone(),
        _ => {
            eprintln!(
                "Several properties registered ({}). Pass --property <id>.",
                properties
                    .iter()
                    .map(|p| p.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            std::process::exit(1);
        }
    }
}

fn save_store(store: &TaskStore<FileStore>) {
    if let Err(e) = store.kv().save() {
        eprintln!("Failed to save store: {e}");
        std::process::exit(1);
    }
}

fn load_or_exit(store: &TaskStore<FileStore>, property: &str, id: &str) -> Task {
    match store.load_task(property, id) {
        Ok(task) => task,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Launch the status board.
pub fn cmd_board(db_path: &Path, property: Option<String>) {
    let store = TaskStore::new(FileStore::load(db_path));
    let property = resolve_property(&store, property);
    drop(store);
    if let Err(e) = run_board_tui(db_path, &property) {
        eprintln!("Board error: {e}");
        std::process::exit(1);
    }
}

/// Add a new task, then let the recurrence engine schedule the successor
/// occurrence if a pattern was given. Recurrence failures never block the
/// primary write.
#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    store: &mut TaskStore<FileStore>,
    title: String,
    property: Option<String>,
    desc: Option<String>,
    instructions: Option<String>,
    category: Category,
    priority: Priority,
    assignees: Vec<String>,
    due: Option<String>,
    estimate: Option<u32>,
    recur: Option<RecurrenceKind>,
    every: u32,
    days_of_week: Vec<u8>,
    until: Option<String>,
    rotate: bool,
) {
    let property = resolve_property(store, property);
    if title.trim().is_empty() {
        eprintln!("Error: {}", Error::Validation("title cannot be empty".into()));
        std::process::exit(1);
    }
    if recur.is_some() && every == 0 {
        eprintln!(
            "Error: {}",
            Error::Validation("recurrence interval must be at least 1".into())
        );
        std::process::exit(1);
    }

    let now = Utc::now();
    let today = Local::now().date_naive();

    let due = match due {
        Some(raw) => match parse_due_input(&raw, today) {
            Some(d) => Some(d),
            None => {
                eprintln!("Unrecognised due date. Use YYYY-MM-DD, 'today', 'tomorrow', or 'in Nd'.");
                std::process::exit(1);
            }
        },
        None => None,
    };
    let until = match until {
        Some(raw) => match parse_due_input(&raw, today) {
            Some(d) => Some(d),
            None => {
                eprintln!("Unrecognised --until date.");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let recurrence = recur.map(|kind| RecurrencePattern {
        kind,
        interval: every,
        days_of_week: if days_of_week.is_empty() {
            None
        } else {
            Some(days_of_week)
        },
        end_date: until,
        assignment_rotation: rotate,
    });

    let mut task = Task::new(
        Uuid::new_v4().to_string(),
        property,
        title.trim().to_string(),
        category,
        priority,
        now,
    );
    task.description = desc.filter(|d| !d.is_empty());
    task.instructions = instructions.filter(|i| !i.is_empty());
    task.assigned_to = assignees;
    task.due = due;
    task.estimated_minutes = estimate;
    task.recurrence = recurrence;

    if let Err(e) = store.save_task(&mut task, now) {
        eprintln!("Failed to save task: {e}");
        std::process::exit(1);
    }

    // Creation-triggered scheduling; a failure in here is logged and the
    // add still succeeds.
    let successor = spawn_next(store, &task, now);

    save_store(store);
    println!("Added task {}", task.id);
    if let Some(next) = successor {
        println!(
            "Scheduled next occurrence {} due {}",
            next.id,
            next.due.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
        );
    }
}

/// List tasks with optional filtering and sorting.
#[allow(clippy::too_many_arguments)]
pub fn cmd_list(
    store: &TaskStore<FileStore>,
    property: Option<String>,
    all: bool,
    status: Option<Status>,
    category: Option<Category>,
    assignee: Option<String>,
    due: Option<DueFilter>,
    sort: SortKey,
    limit: Option<usize>,
) {
    let property = resolve_property(store, property);
    let today = Local::now().date_naive();
    let (week_start, week_end) = crate::dates::start_end_of_this_week(today);

    let tasks = store.list_property_tasks(&property);
    let mut filtered: Vec<&Task> = tasks
        .iter()
        .filter(|t| {
            if !all && t.status.is_terminal() && status.is_none() {
                return false;
            }
            if let Some(s) = status {
                if t.effective_status(today) != s {
                    return false;
                }
            }
            if let Some(c) = category {
                if t.category != c {
                    return false;
                }
            }
            if let Some(ref user) = assignee {
                if !t.assigned_to.iter().any(|u| u == user) {
                    return false;
                }
            }
            if let Some(df) = due {
                match df {
                    DueFilter::Today => {
                        if t.due != Some(today) {
                            return false;
                        }
                    }
                    DueFilter::ThisWeek => match t.due {
                        Some(d) if d >= week_start && d <= week_end => {}
                        _ => return false,
                    },
                    DueFilter::Overdue => {
                        if !t.is_overdue(today) {
                            return false;
                        }
                    }
                    DueFilter::None => {
                        if t.due.is_some() {
                            return false;
                        }
                    }
                }
            }
            true
        })
        .collect();

    match sort {
        SortKey::Due => filtered.sort_by_key(|t| (t.due.unwrap_or(NaiveDate::MAX), t.id.clone())),
        SortKey::Priority => filtered.sort_by(|a, b| metrics::compare_tasks(a, b)),
        SortKey::Created => filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }

    if let Some(n) = limit {
        filtered.truncate(n);
    }

    print_table(&filtered, today);
}

/// Print tasks in a formatted table.
pub fn print_table(tasks: &[&Task], today: NaiveDate) {
    println!(
        "{:<10} {:<12} {:<9} {:<15} {:<10} {:<16} {}",
        "ID", "Status", "Pri", "Category", "Due", "Assignees", "Title"
    );
    for t in tasks {
        let assignees = if t.assigned_to.is_empty() {
            "-".to_string()
        } else {
            t.assigned_to.join(",")
        };
        println!(
            "{:<10} {:<12} {:<9} {:<15} {:<10} {:<16} {}",
            truncate(&t.id, 10),
            format_status(t.effective_status(today)),
            format_priority(t.priority),
            format_category(t.category),
            format_due_relative(t.due, today),
            truncate(&assignees, 16),
            t.title
        );
    }
}

/// View detailed information about a specific task.
pub fn cmd_view(store: &TaskStore<FileStore>, property: Option<String>, id: String) {
    let property = resolve_property(store, property);
    let task = load_or_exit(store, &property, &id);
    let today = Local::now().date_naive();

    println!("ID:           {}", task.id);
    println!("Property:     {}", task.property_id);
    println!("Title:        {}", task.title);
    println!("Status:       {}", format_status(task.effective_status(today)));
    println!("Priority:     {}", format_priority(task.priority));
    println!("Category:     {}", format_category(task.category));
    println!(
        "Due:          {}",
        match task.due {
            Some(d) => format!("{d} ({})", format_due_relative(Some(d), today)),
            None => "-".into(),
        }
    );
    println!(
        "Assignees:    {}",
        if task.assigned_to.is_empty() {
            "-".into()
        } else {
            task.assigned_to.join(", ")
        }
    );
    println!(
        "Estimate:     {}",
        task.estimated_minutes
            .map(|m| format!("{m} min"))
            .unwrap_or_else(|| "-".into())
    );
    if let Some(ref rec) = task.recurrence {
        let days = rec
            .days_of_week
            .as_ref()
            .map(|d| {
                d.iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_else(|| "-".into());
        println!(
            "Recurs:       {:?} every {} (days {}, until {}, rotation {})",
            rec.kind,
            rec.interval,
            days,
            rec.end_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
            rec.assignment_rotation
        );
    }
    println!("Created UTC:  {}", task.created_at.to_rfc3339());
    println!("Updated UTC:  {}", task.updated_at.to_rfc3339());
    if let Some(at) = task.completed_at {
        println!("Completed:    {}", at.to_rfc3339());
        println!(
            "Completed by: {}",
            task.completed_by.as_deref().unwrap_or("-")
        );
        println!(
            "Rating:       {}",
            task.quality_rating
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".into())
        );
        if let Some(ref notes) = task.completion_notes {
            println!("Notes:        {notes}");
        }
        if !task.completion_photos.is_empty() {
            println!("Photos:       {}", task.completion_photos.join(", "));
        }
    }
    println!(
        "Description:\n{}\n",
        task.description.as_deref().unwrap_or("-")
    );
    if let Some(ref instructions) = task.instructions {
        println!("Instructions:\n{instructions}\n");
    }
}

/// Update an existing task's fields.
#[allow(clippy::too_many_arguments)]
pub fn cmd_update(
    store: &mut TaskStore<FileStore>,
    property: Option<String>,
    id: String,
    title: Option<String>,
    desc: Option<String>,
    instructions: Option<String>,
    category: Option<Category>,
    priority: Option<Priority>,
    assignees: Vec<String>,
    due: Option<String>,
    clear_due: bool,
    status: Option<Status>,
) {
    let property = resolve_property(store, property);
    let mut task = load_or_exit(store, &property, &id);
    let now = Utc::now();
    let today = Local::now().date_naive();

    if let Some(s) = title {
        if s.trim().is_empty() {
            eprintln!("Error: {}", Error::Validation("title cannot be empty".into()));
            std::process::exit(1);
        }
        task.title = s;
    }
    if let Some(d) = desc {
        task.description = if d.is_empty() { None } else { Some(d) };
    }
    if let Some(i) = instructions {
        task.instructions = if i.is_empty() { None } else { Some(i) };
    }
    if let Some(c) = category {
        task.category = c;
    }
    if let Some(p) = priority {
        task.priority = p;
    }
    if !assignees.is_empty() {
        task.assigned_to = assignees;
    }
    if clear_due {
        task.due = None;
    }
    if let Some(raw) = due {
        match parse_due_input(&raw, today) {
            Some(d) => task.due = Some(d),
            None => {
                eprintln!("Unrecognised due date. Use YYYY-MM-DD, 'today', 'tomorrow', or 'in Nd'.");
                std::process::exit(1);
            }
        }
    }
    if let Some(next) = status {
        if !task.status.can_transition(next) {
            eprintln!(
                "Error: {}",
                Error::InvalidTransition {
                    from: task.status,
                    to: next
                }
            );
            std::process::exit(1);
        }
        task.status = next;
        if next == Status::Completed {
            task.completed_at = Some(now);
        }
    }

    if let Err(e) = store.save_task(&mut task, now) {
        eprintln!("Failed to save task: {e}");
        std::process::exit(1);
    }
    save_store(store);
    println!("Updated task {}", task.id);
}

/// Mark a task completed with optional completion metadata.
pub fn cmd_complete(
    store: &mut TaskStore<FileStore>,
    property: Option<String>,
    id: String,
    by: Option<String>,
    notes: Option<String>,
    rating: Option<u8>,
    photos: Vec<String>,
) {
    let property = resolve_property(store, property);
    let mut task = load_or_exit(store, &property, &id);
    let now = Utc::now();

    if !task.status.can_transition(Status::Completed) {
        eprintln!(
            "Error: {}",
            Error::InvalidTransition {
                from: task.status,
                to: Status::Completed
            }
        );
        std::process::exit(1);
    }
    if let Some(r) = rating {
        if !(1..=5).contains(&r) {
            eprintln!(
                "Error: {}",
                Error::Validation("rating must be between 1 and 5".into())
            );
            std::process::exit(1);
        }
    }

    task.status = Status::Completed;
    task.completed_at = Some(now);
    task.completed_by = by;
    task.completion_notes = notes;
    task.quality_rating = rating;
    task.completion_photos = photos;

    if let Err(e) = store.save_task(&mut task, now) {
        eprintln!("Failed to save task: {e}");
        std::process::exit(1);
    }
    save_store(store);
    println!("Completed task {}", task.id);
}

/// Cancel a task. Terminal.
pub fn cmd_cancel(store: &mut TaskStore<FileStore>, property: Option<String>, id: String) {
    let property = resolve_property(store, property);
    let mut task = load_or_exit(store, &property, &id);
    let now = Utc::now();

    if !task.status.can_transition(Status::Cancelled) {
        eprintln!(
            "Error: {}",
            Error::InvalidTransition {
                from: task.status,
                to: Status::Cancelled
            }
        );
        std::process::exit(1);
    }
    task.status = Status::Cancelled;

    if let Err(e) = store.save_task(&mut task, now) {
        eprintln!("Failed to save task: {e}");
        std::process::exit(1);
    }
    save_store(store);
    println!("Cancelled task {}", task.id);
}

/// Soft-delete a task.
pub fn cmd_delete(store: &mut TaskStore<FileStore>, property: Option<String>, id: String) {
    let property = resolve_property(store, property);
    let mut task = load_or_exit(store, &property, &id);
    let now = Utc::now();
    task.deleted_at = Some(now);

    if let Err(e) = store.save_task(&mut task, now) {
        eprintln!("Failed to save task: {e}");
        std::process::exit(1);
    }
    save_store(store);
    println!("Deleted task {}", task.id);
}

/// Run a bulk operation as a given user.
pub fn cmd_bulk(store: &mut TaskStore<FileStore>, actor: String, action: BulkCmd) {
    let now = Utc::now();
    let today = Local::now().date_naive();

    let (ids, bulk_action) = match action {
        BulkCmd::Assign { users, ids } => (ids, BulkAction::Assign(users)),
        BulkCmd::Priority { value, ids } => (ids, BulkAction::Priority(value)),
        BulkCmd::Category { value, ids } => (ids, BulkAction::Category(value)),
        BulkCmd::Deadline { date, ids } => match parse_due_input(&date, today) {
            Some(d) => (ids, BulkAction::Deadline(d)),
            None => {
                eprintln!("Unrecognised deadline date.");
                std::process::exit(1);
            }
        },
        BulkCmd::Complete { ids } => (ids, BulkAction::Complete),
        BulkCmd::Cancel { ids } => (ids, BulkAction::Cancel),
    };

    let session = Session::resolve(store.kv(), &actor);
    let access = access_set(store.kv(), &session);

    match apply_bulk(store, &ids, &bulk_action, &session.user, &access, now) {
        Ok(outcome) => {
            save_store(store);
            println!("Updated {} task(s)", outcome.updated);
            let refs: Vec<&Task> = outcome.tasks.iter().collect();
            print_table(&refs, today);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Personal dashboard for one user across every property.
pub fn cmd_dashboard(store: &TaskStore<FileStore>, user: String, horizon: i64) {
    let now = Utc::now();
    let today = Local::now().date_naive();

    let mut mine: Vec<Task> = Vec::new();
    for property in list_properties(store.kv()) {
        mine.extend(
            store
                .list_property_tasks(&property.id)
                .into_iter()
                .filter(|t| t.assigned_to.iter().any(|u| u == &user)),
        );
    }

    let open = mine.iter().filter(|t| !t.status.is_terminal()).count();
    let overdue = metrics::overdue_count(&mine, today);
    let score = metrics::productivity_score(&mine, now);

    println!("Dashboard for {user}");
    println!("Assigned:     {} ({} open)", mine.len(), open);
    println!("Overdue:      {overdue}");
    println!("Productivity: {score}/100");

    let upcoming = metrics::upcoming_deadlines(&mine, today, horizon, 5);
    println!("Next deadlines ({horizon}d horizon):");
    if upcoming.is_empty() {
        println!("  -");
    } else {
        for t in upcoming {
            println!(
                "  {} {} ({})",
                truncate(&t.id, 10),
                t.title,
                format_due_relative(t.due, today)
            );
        }
    }

    let workload = metrics::workload_by_category(&mine);
    println!("Open workload by category:");
    for (category, count) in workload {
        println!("  {:<15} {}", format_category(category), count);
    }
}

/// Per-user or per-category metric tables.
pub fn cmd_stats(store: &TaskStore<FileStore>, property: Option<String>, by: StatsBy) {
    let property = resolve_property(store, property);
    let today = Local::now().date_naive();
    let tasks = store.list_property_tasks(&property);

    match by {
        StatsBy::Users => {
            println!(
                "{:<16} {:>6} {:>6} {:>8} {:>10} {:>8} {:>8}",
                "User", "Total", "Done", "Rate%", "AvgHours", "Overdue", "Quality"
            );
            for (user, m) in metrics::user_metrics(&tasks, today) {
                println!(
                    "{:<16} {:>6} {:>6} {:>8.1} {:>10.1} {:>8} {:>8.1}",
                    truncate(&user, 16),
                    m.total,
                    m.completed,
                    m.completion_rate,
                    m.avg_completion_hours,
                    m.overdue,
                    m.avg_quality_rating
                );
            }
        }
        StatsBy::Categories => {
            println!(
                "{:<16} {:>6} {:>6} {:>10} {:>10}",
                "Category", "Total", "Done", "AvgHours", "Overdue%"
            );
            for (category, m) in metrics::category_metrics(&tasks, today) {
                println!(
                    "{:<16} {:>6} {:>6} {:>10.1} {:>10.1}",
                    format_category(category),
                    m.total,
                    m.completed,
                    m.avg_completion_hours,
                    m.overdue_rate
                );
            }
        }
    }
}

/// Daily created/completed trend table, oldest first.
pub fn cmd_trends(store: &TaskStore<FileStore>, property: Option<String>, days: u32) {
    let property = resolve_property(store, property);
    let today = Local::now().date_naive();
    let tasks = store.list_property_tasks(&property);

    println!(
        "{:<12} {:>8} {:>10} {:>10}",
        "Date", "Created", "Completed", "AvgHours"
    );
    for point in metrics::productivity_trends(&tasks, today, days) {
        println!(
            "{:<12} {:>8} {:>10} {:>10.1}",
            point.date.to_string(),
            point.created,
            point.completed,
            point.avg_completion_hours
        );
    }
}

/// Substring search over a property's tasks.
pub fn cmd_search(
    store: &TaskStore<FileStore>,
    property: Option<String>,
    query: String,
    limit: usize,
) {
    let property = resolve_property(store, property);
    let tasks = store.list_property_tasks(&property);
    let hits = metrics::search(&tasks, &query, limit);

    if hits.is_empty() {
        println!("No matches.");
        return;
    }
    for hit in hits {
        println!(
            "{:<10} {:>4.1} {} [{}]",
            truncate(&hit.task.id, 10),
            hit.score,
            hit.task.title,
            hit.matched_fields.join(",")
        );
    }
}

/// List registered properties and their live task counts.
pub fn cmd_properties(store: &TaskStore<FileStore>) {
    println!("{:<20} {:<24} {}", "ID", "Name", "Tasks");
    for property in list_properties(store.kv()) {
        let count = store.list_property_tasks(&property.id).len();
        println!(
            "{:<20} {:<24} {}",
            truncate(&property.id, 20),
            truncate(&property.name, 24),
            count
        );
    }
}

/// Handle property management commands.
pub fn cmd_property(store: &mut TaskStore<FileStore>, action: PropertyAction) {
    match action {
        PropertyAction::Add { name } => match register_property(store.kv_mut(), &name) {
            Ok(property) => {
                save_store(store);
                println!("Registered property {} ({})", property.id, property.name);
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        PropertyAction::Grant { property, user } => {
            match add_manager(store.kv_mut(), &property, &user) {
                Ok(()) => {
                    save_store(store);
                    println!("Granted {user} manager access to {property}");
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Export tasks to CSV format for external analysis.
pub fn cmd_export(
    store: &TaskStore<FileStore>,
    property: Option<String>,
    output: Option<String>,
    all: bool,
) {
    let property = resolve_property(store, property);
    let output_path = output.unwrap_or_else(|| "tasks.csv".to_string());
    let today = Local::now().date_naive();

    let tasks: Vec<Task> = store
        .list_property_tasks(&property)
        .into_iter()
        .filter(|t| all || !t.status.is_terminal())
        .collect();

    let escape_csv = |s: &str| {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    };

    let mut csv = String::from(
        "ID,Property,Title,Category,Priority,Status,Assignees,Due,EstimatedMinutes,CompletedUTC,CompletedBy,Rating,CreatedUTC,UpdatedUTC,Description\n",
    );
    for t in &tasks {
        let assignees = t.assigned_to.join(";");
        let due = t.due.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
        let completed = t
            .completed_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            escape_csv(&t.id),
            escape_csv(&t.property_id),
            escape_csv(&t.title),
            format_category(t.category),
            format_priority(t.priority),
            format_status(t.effective_status(today)),
            escape_csv(&assignees),
            escape_csv(&due),
            t.estimated_minutes
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".into()),
            escape_csv(&completed),
            escape_csv(t.completed_by.as_deref().unwrap_or("-")),
            t.quality_rating
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".into()),
            escape_csv(&t.created_at.to_rfc3339()),
            escape_csv(&t.updated_at.to_rfc3339()),
            escape_csv(t.description.as_deref().unwrap_or("-"))
        ));
    }

    match std::fs::write(&output_path, csv) {
        Ok(_) => println!("Exported {} task(s) to {}", tasks.len(), output_path),
        Err(e) => {
            eprintln!("Failed to write CSV file: {e}");
            std::process::exit(1);
        }
    }
}

/// Create a timestamped backup of the store file.
pub fn cmd_backup(db_path: &Path) {
    if !db_path.exists() {
        eprintln!("Store file does not exist yet, nothing to back up.");
        std::process::exit(1);
    }

    let parent_dir = db_path.parent().unwrap_or_else(|| Path::new("."));
    let backup_dir = parent_dir.join("backup");
    if let Err(e) = std::fs::create_dir_all(&backup_dir) {
        eprintln!("Failed to create backup directory: {e}");
        std::process::exit(1);
    }

    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let file_name = db_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("store.json");
    let backup_path = backup_dir.join(format!("{timestamp}_{file_name}"));

    match std::fs::copy(db_path, &backup_path) {
        Ok(_) => println!("Backup created: {}", backup_path.display()),
        Err(e) => {
            eprintln!("Failed to create backup: {e}");
            std::process::exit(1);
        }
    }
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}
