//! # sf - Factory Workflow CLI
//!
//! A command-line workflow manager for factory operations. Every operation
//! moves through a fixed department pipeline (Planning → Engineering →
//! Procurement → Production → Quality) and can only advance once the current
//! stage's quality gates are all satisfied. Production issues halt an
//! operation until an admin resolves them, and every transition lands in a
//! per-operation audit trail.
//!
//! ## Quick Start
//!
//! ```bash
//! # Add an operation (seeded with the workspace gate templates)
//! sf add "Control cabinet frame" --priority high --assignee Sam
//!
//! # Work the gates, then hand the operation to the next department
//! sf view 1
//! sf check 1 planning-1
//! sf check 1 planning-2
//! sf advance 1
//!
//! # Halt on a technical problem, resume once fixed
//! sf block 1 "Laser head misaligned" --kind machine-failure
//! sf resolve 1
//!
//! # Close out after the Quality stage signs off
//! sf done 1
//! ```
//!
//! Data is stored locally in `~/.shopfloor/` with each workspace as a
//! separate JSON file. Point `--db` at a specific file to manage several
//! floors side by side.

use std::path::PathBuf;

use clap::Parser;

pub mod auth;
pub mod cli;
pub mod cmd;
pub mod fields;
pub mod notify;
pub mod store;
pub mod task;
pub mod workflow;
pub mod workspace;

use cli::Cli;
use cmd::*;
use store::Store;
use workspace::{get_most_recent_workspace, Workspace};

fn main() {
    let cli = Cli::parse();

    // Determine the data directory
    let data_dir = if let Some(db_path) = cli.db.as_ref() {
        db_path
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .to_path_buf()
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let data_dir = PathBuf::from(home).join(".shopfloor");
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            eprintln!("Failed to create data directory {}: {}", data_dir.display(), e);
            std::process::exit(1);
        }
        data_dir
    };

    // Whole-directory commands don't need a specific workspace
    if let Commands::Backup { all: true } = &cli.command {
        cmd_backup_all(&data_dir);
        return;
    }

    // Determine the workspace file: --db wins, then the most recently used
    // workspace, then a freshly seeded default.
    let db_path = cli.db.unwrap_or_else(|| {
        match get_most_recent_workspace(&data_dir) {
            Ok(Some(ws)) => ws.file_path,
            _ => {
                let default_ws = Workspace::new("Main Floor", &data_dir);
                if let Err(e) = default_ws.create_if_not_exists() {
                    eprintln!("Failed to create default workspace: {}", e);
                    std::process::exit(1);
                }
                default_ws.file_path
            }
        }
    });

    let mut store = Store::load(&db_path);
    let actor = resolve_actor(&store, cli.user.as_deref());

    match cli.command {
        Commands::Add {
            title,
            desc,
            priority,
            list,
            assignees,
            no_gates,
        } => cmd_add(
            &mut store, &db_path, &actor, title, desc, priority, list, assignees, no_gates,
        ),

        Commands::List {
            all,
            department,
            status,
            blocked,
            list,
            assignee,
            sort,
            limit,
        } => cmd_list(
            &store, all, department, status, blocked, list, assignee, sort, limit,
        ),

        Commands::View { id } => cmd_view(&store, id),

        Commands::Check {
            id,
            item,
            department,
        } => cmd_check(&mut store, &db_path, &actor, id, item, department),

        Commands::Gate { action } => cmd_gate(&mut store, &db_path, action),

        Commands::Advance { id } => cmd_advance(&mut store, &db_path, &actor, id),

        Commands::Back { id, to, reason } => cmd_back(&mut store, &db_path, &actor, id, to, reason),

        Commands::Block {
            id,
            description,
            kind,
            department,
        } => cmd_block(&mut store, &db_path, &actor, id, description, kind, department),

        Commands::Resolve { id } => cmd_resolve(&mut store, &db_path, &actor, id),

        Commands::Done { id } => cmd_done(&mut store, &db_path, &actor, id),

        Commands::Update {
            id,
            title,
            desc,
            priority,
            list,
            status,
            add_assignees,
            rm_assignees,
            watch,
            unwatch,
        } => cmd_update(
            &mut store,
            &db_path,
            &actor,
            id,
            title,
            desc,
            priority,
            list,
            status,
            add_assignees,
            rm_assignees,
            watch,
            unwatch,
        ),

        Commands::Comment { id, text } => cmd_comment(&mut store, &db_path, &actor, id, text),

        Commands::Subtask { action } => cmd_subtask(&mut store, &db_path, action),

        Commands::User { action } => cmd_user(&mut store, &db_path, action),

        Commands::Space { action } => cmd_space(&mut store, &db_path, action),

        Commands::Notifications { all, read } => {
            cmd_notifications(&mut store, &db_path, all, read)
        }

        Commands::Export { output, all } => cmd_export(&store, output, all),

        Commands::Backup { all } => cmd_backup(&db_path, all),

        Commands::Completions { shell } => cmd_completions(shell),
    }
}
