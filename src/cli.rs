use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// File-backed factory workflow CLI.
/// Storage defaults to ~/.shopfloor or a workspace file passed via --db.
#[derive(Parser)]
#[command(name = "sf", version, about = "Factory production workflow CLI")]
pub struct Cli {
    /// Path to the workspace JSON file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Acting user name; defaults to the workspace's first admin.
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}
