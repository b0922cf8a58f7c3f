//! # props - Coliving Property Operations CLI
//!
//! A command-line tool for running the day-to-day operations of coliving
//! and rental properties: task records with assignment and scheduling,
//! recurring task generation, bulk operations, workload metrics and an
//! interactive status board.
//!
//! ## Key Features
//!
//! - **Property-Scoped Tasks**: every task belongs to one property;
//!   managers only reach tasks of properties they manage
//! - **Recurring Work**: daily/weekly/monthly/custom schedules with
//!   assignee rotation, generated as real successor tasks
//! - **Derived Status**: overdue is computed from the due date at read
//!   time, never stored by hand
//! - **Bulk Operations**: assign, reprioritise, recategorise, set
//!   deadlines, complete or cancel across many tasks at once
//! - **Metrics**: per-user and per-category rollups, trailing trends and
//!   a 0-100 productivity score
//! - **Two Interfaces**: full CLI for automation + a TUI board for visual
//!   triage
//!
//! ## Quick Start
//!
//! ```bash
//! # Register a property and grant yourself access
//! props property add "Casa Verde"
//! props property grant casa-verde ana
//!
//! # Add a recurring task
//! props add "Take out bins" --assign ana --assign bo \
//!     --due friday --recur weekly --rotate
//!
//! # Triage visually
//! props board
//!
//! # Bulk-complete finished work
//! props bulk --as ana complete <id> <id>
//! ```
//!
//! Data is stored locally in `~/.props/store.json`. We recommend you back
//! it up periodically (`props backup`).

use std::path::PathBuf;

use clap::Parser;

pub mod bulk;
pub mod cli;
pub mod cmd;
pub mod dates;
pub mod error;
pub mod fields;
pub mod metrics;
pub mod recurrence;
pub mod session;
pub mod store;
pub mod task;
pub mod tui {
    pub mod board;
    pub mod board_run;
    pub mod colors;
}

use cli::Cli;
use cmd::*;
use store::{FileStore, TaskStore};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Determine the store file path.
    let db_path = cli.db.clone().unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let props_dir = PathBuf::from(home).join(".props");
        if let Err(e) = std::fs::create_dir_all(&props_dir) {
            eprintln!("Failed to create props directory {}: {}", props_dir.display(), e);
            std::process::exit(1);
        }
        props_dir.join("store.json")
    });

    // Commands that manage the store file itself or no store at all.
    match &cli.command {
        Commands::Completions { shell } => {
            cmd_completions(*shell);
            return;
        }
        Commands::Board { property } => {
            cmd_board(&db_path, property.clone());
            return;
        }
        Commands::Backup => {
            cmd_backup(&db_path);
            return;
        }
        _ => {}
    }

    let mut store = TaskStore::new(FileStore::load(&db_path));

    match cli.command {
        Commands::Completions { .. } => unreachable!("completions handled above"),
        Commands::Board { .. } => unreachable!("board handled above"),
        Commands::Backup => unreachable!("backup handled above"),

        Commands::Add {
            title, property, desc, instructions, category, priority, assignees,
            due, estimate, recur, every, days_of_week, until, rotate,
        } => cmd_add(&mut store, title, property, desc, instructions, category,
                     priority, assignees, due, estimate, recur, every,
                     days_of_week, until, rotate),

        Commands::List { property, all, status, category, assignee, due, sort, limit } =>
            cmd_list(&store, property, all, status, category, assignee, due, sort, limit),

        Commands::View { id, property } => cmd_view(&store, property, id),

        Commands::Update { id, property, title, desc, instructions, category,
                           priority, assignees, due, clear_due, status } =>
            cmd_update(&mut store, property, id, title, desc, instructions,
                       category, priority, assignees, due, clear_due, status),

        Commands::Complete { id, property, by, notes, rating, photos } =>
            cmd_complete(&mut store, property, id, by, notes, rating, photos),

        Commands::Cancel { id, property } => cmd_cancel(&mut store, property, id),

        Commands::Delete { id, property } => cmd_delete(&mut store, property, id),

        Commands::Bulk { actor, action } => cmd_bulk(&mut store, actor, action),

        Commands::Dashboard { user, horizon } => cmd_dashboard(&store, user, horizon),

        Commands::Stats { property, by } => cmd_stats(&store, property, by),

        Commands::Trends { property, days } => cmd_trends(&store, property, days),

        Commands::Search { query, property, limit } =>
            cmd_search(&store, property, query, limit),

        Commands::Properties => cmd_properties(&store),

        Commands::Property { action } => cmd_property(&mut store, action),

        Commands::Export { property, output, all } =>
            cmd_export(&store, property, output, all),
    }
}
