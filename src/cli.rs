use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// File-backed property operations CLI.
/// Storage defaults to ~/.props/store.json or a path passed via --db.
#[derive(Parser)]
#[command(name = "props", version, about = "Coliving property task operations CLI")]
pub struct Cli {
    /// Path to the JSON store file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
