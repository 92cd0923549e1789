//! Command implementations for the CLI interface.
//!
//! This module contains all the command handlers that implement the various
//! subcommands available in the CLI, from operation CRUD to the workflow
//! transitions (advance, block, resolve, rework, done).

use std::path::Path;

use chrono::{Local, Utc};
use clap::Subcommand;
use clap_complete::{generate, Shell};

use crate::auth::{self, User};
use crate::fields::*;
use crate::notify::Notification;
use crate::store::{resolve_task_identifier, List, Space, Store};
use crate::task::{
    count_subtasks, find_subtask_mut, ChecklistItem, ProductionData, Subtask, Task, TaskComment,
};
use crate::workflow::{self, IssueReport, WorkflowEvent};

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new operation to the pipeline.
    Add {
        /// Short title for the operation.
        title: String,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Priority: urgent | high | normal | low.
        #[arg(long, value_enum, default_value_t = Priority::Normal)]
        priority: Priority,
        /// List ID to file the operation under.
        #[arg(long)]
        list: Option<String>,
        /// Assignee user name. May be repeated.
        #[arg(long = "assignee")]
        assignees: Vec<String>,
        /// Skip instantiating the workspace gate templates.
        #[arg(long)]
        no_gates: bool,
    },

    /// List operations with optional filters.
    List {
        /// Include completed operations.
        #[arg(long)]
        all: bool,
        /// Filter by pipeline stage.
        #[arg(long, value_enum)]
        department: Option<Department>,
        /// Filter by status.
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// Only operations halted by an open issue.
        #[arg(long)]
        blocked: bool,
        /// Filter by list ID.
        #[arg(long)]
        list: Option<String>,
        /// Filter by assignee.
        #[arg(long)]
        assignee: Option<String>,
        /// Sort key.
        #[arg(long, value_enum, default_value_t = SortKey::Stage)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single operation by ID or title.
    View {
        /// Operation ID or title to view.
        id: String,
    },

    /// Toggle a quality-gate checklist item.
    Check {
        /// Operation ID or title.
        id: String,
        /// Checklist item ID (shown by view).
        item: String,
        /// Stage whose checklist holds the item; defaults to the current one.
        #[arg(long, value_enum)]
        department: Option<Department>,
    },

    /// Manage quality-gate templates and per-operation gate items.
    Gate {
        #[command(subcommand)]
        action: GateAction,
    },

    /// Advance an operation to the next department.
    Advance {
        /// Operation ID or title.
        id: String,
    },

    /// Send an operation back to an earlier department for rework.
    Back {
        /// Operation ID or title.
        id: String,
        /// Earlier stage to return the operation to.
        #[arg(long, value_enum)]
        to: Department,
        /// Why the work is coming back.
        #[arg(long)]
        reason: String,
    },

    /// Report a production issue and halt the operation.
    Block {
        /// Operation ID or title.
        id: String,
        /// What stopped the work.
        description: String,
        /// Issue classification.
        #[arg(long, value_enum, default_value_t = IssueType::Other)]
        kind: IssueType,
        /// Reporting department; defaults to yours, then the operation's.
        #[arg(long, value_enum)]
        department: Option<Department>,
    },

    /// Resolve all open issues and resume the operation (admin only).
    Resolve {
        /// Operation ID or title.
        id: String,
    },

    /// Close an operation after final quality approval.
    Done {
        /// Operation ID or title.
        id: String,
    },

    /// Update fields on an operation.
    Update {
        /// Operation ID or title.
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long)]
        list: Option<String>,
        /// Status; blocked and done are managed by block/resolve/done.
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// Add an assignee. May be repeated.
        #[arg(long = "add-assignee")]
        add_assignees: Vec<String>,
        /// Remove an assignee. May be repeated.
        #[arg(long = "rm-assignee")]
        rm_assignees: Vec<String>,
        /// Watch the operation as the acting user.
        #[arg(long)]
        watch: bool,
        /// Stop watching.
        #[arg(long)]
        unwatch: bool,
    },

    /// Comment on an operation.
    Comment {
        /// Operation ID or title.
        id: String,
        /// Comment text.
        text: String,
    },

    /// Manage subtasks on an operation.
    Subtask {
        #[command(subcommand)]
        action: SubtaskAction,
    },

    /// Manage workspace users.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage floor spaces and their task lists.
    Space {
        #[command(subcommand)]
        action: SpaceAction,
    },

    /// Show workflow notifications.
    Notifications {
        /// Include notifications already marked read.
        #[arg(long)]
        all: bool,
        /// Mark everything read afterwards.
        #[arg(long)]
        read: bool,
    },

    /// Export operations to CSV format.
    Export {
        /// Output file path (default: operations.csv)
        #[arg(long, short)]
        output: Option<String>,
        /// Include completed operations
        #[arg(long)]
        all: bool,
    },

    /// Create timestamped backup of current workspace or all workspaces.
    Backup {
        /// Backup all workspaces instead of just current
        #[arg(long)]
        all: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum GateAction {
    /// Add a gate template for a department.
    Add {
        #[arg(value_enum)]
        department: Department,
        label: String,
    },
    /// Remove a gate template by its 1-based position.
    Rm {
        #[arg(value_enum)]
        department: Department,
        position: usize,
    },
    /// List the workspace gate templates.
    List,
    /// Attach an extra gate item to one operation's checklist.
    Attach {
        /// Operation ID or title.
        id: String,
        #[arg(value_enum)]
        department: Department,
        label: String,
    },
}

#[derive(Subcommand)]
pub enum SubtaskAction {
    /// Add a subtask, optionally nested under an existing subtask.
    Add {
        /// Operation ID or title.
        id: String,
        title: String,
        /// Parent subtask ID for nesting.
        #[arg(long)]
        parent: Option<String>,
    },
    /// Toggle a subtask's completion.
    Toggle {
        /// Operation ID or title.
        id: String,
        /// Subtask ID.
        subtask: String,
    },
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Add a workspace user.
    Add {
        name: String,
        #[arg(long, value_enum, default_value_t = Role::Technician)]
        role: Role,
        #[arg(long, value_enum)]
        department: Option<Department>,
    },
    /// List workspace users.
    List,
}

#[derive(Subcommand)]
pub enum SpaceAction {
    /// Add a floor space owned by a department.
    Add {
        name: String,
        #[arg(long, value_enum)]
        department: Department,
    },
    /// Add a task list to a space.
    AddList {
        /// Space ID or name.
        space: String,
        name: String,
    },
    /// List spaces and their task lists.
    List,
}

/// Resolve the acting user: an explicit --user must exist in the workspace;
/// otherwise the first admin, then the first user, then a standalone
/// Supervisor admin for stores that carry no users yet.
pub fn resolve_actor(store: &Store, name: Option<&str>) -> User {
    if let Some(name) = name {
        match store.find_user(name) {
            Some(u) => return u.clone(),
            None => {
                eprintln!("User '{}' not found in this workspace.", name);
                std::process::exit(1);
            }
        }
    }
    store
        .users
        .iter()
        .find(|u| u.role == Role::Admin)
        .or_else(|| store.users.first())
        .cloned()
        .unwrap_or(User {
            name: "Supervisor".to_string(),
            role: Role::Admin,
            department: None,
        })
}

fn resolve_or_exit(identifier: &str, store: &Store) -> u64 {
    match resolve_task_identifier(identifier, store) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error resolving operation: {}", e);
            std::process::exit(1);
        }
    }
}

fn save_or_exit(store: &Store, path: &Path) {
    if let Err(e) = store.save(path) {
        eprintln!("Failed to save workspace: {e}");
        std::process::exit(1);
    }
}

/// Store the notification for an engine event and echo it to the terminal.
fn dispatch_event(store: &mut Store, event: &WorkflowEvent) {
    let id = store.notifications.len() as u64 + 1;
    let n = Notification::from_event(id, event, Utc::now());
    println!("[notify] {}: {}", n.title, n.message);
    store.notifications.push(n);
}

/// Add a new operation to the workspace.
pub fn cmd_add(
    store: &mut Store,
    path: &Path,
    actor: &User,
    title: String,
    desc: Option<String>,
    priority: Priority,
    list: Option<String>,
    assignees: Vec<String>,
    no_gates: bool,
) {
    if let Some(ref list_id) = list {
        let known = store
            .spaces
            .iter()
            .flat_map(|s| &s.lists)
            .any(|l| &l.id == list_id);
        if !known {
            eprintln!("List '{}' does not exist. See: sf space list", list_id);
            std::process::exit(1);
        }
    }

    let now = Utc::now();
    let id = store.next_id();
    let checklists = if no_gates {
        Default::default()
    } else {
        store.instantiate_gates()
    };

    let mut task = Task {
        id,
        title,
        description: desc.filter(|d| !d.is_empty()),
        status: Status::Todo,
        current_department: Department::Planning,
        priority,
        assignees,
        watchers: vec![actor.name.clone()],
        list_id: list,
        created_at: now,
        updated_at: now,
        production: ProductionData {
            checklists,
            ..ProductionData::default()
        },
        comments: Vec::new(),
        subtasks: Vec::new(),
        activities: Vec::new(),
    };
    workflow::record_activity(&mut task, actor, "created the operation", now);

    store.tasks.push(task);
    save_or_exit(store, path);
    println!("Added operation {}", id);
}

/// List operations with optional filtering and sorting.
pub fn cmd_list(
    store: &Store,
    all: bool,
    department: Option<Department>,
    status: Option<Status>,
    blocked: bool,
    list: Option<String>,
    assignee: Option<String>,
    sort: SortKey,
    limit: Option<usize>,
) {
    let mut filtered: Vec<&Task> = store
        .tasks
        .iter()
        .filter(|t| {
            if !all && t.status == Status::Done {
                return false;
            }
            if let Some(d) = department {
                if t.current_department != d {
                    return false;
                }
            }
            if let Some(s) = status {
                if t.status != s {
                    return false;
                }
            }
            if blocked && t.status != Status::Blocked {
                return false;
            }
            if let Some(ref l) = list {
                if t.list_id.as_deref() != Some(l.as_str()) {
                    return false;
                }
            }
            if let Some(ref a) = assignee {
                if !t.assignees.iter().any(|n| n.eq_ignore_ascii_case(a)) {
                    return false;
                }
            }
            true
        })
        .collect();

    match sort {
        SortKey::Priority => filtered.sort_by_key(|t| (t.priority.rank(), t.id)),
        SortKey::Stage => filtered.sort_by_key(|t| (t.current_department.position(), t.id)),
        SortKey::Id => filtered.sort_by_key(|t| t.id),
    }

    if let Some(n) = limit {
        filtered.truncate(n);
    }

    print_table(&filtered);
}

/// View detailed information about a specific operation.
pub fn cmd_view(store: &Store, id: String) {
    let task_id = resolve_or_exit(&id, store);
    let Some(task) = store.get(task_id) else {
        eprintln!("Operation {} not found.", task_id);
        std::process::exit(1);
    };

    let (done, total) = workflow::checklist_progress(task);
    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Stage:        {}", task.current_department);
    println!("Status:       {}", task.status);
    println!("Priority:     {}", task.priority);
    println!("Gates:        {}/{}", done, total);
    println!("Rework:       {}", task.production.rework_count);
    println!("List:         {}", task.list_id.as_deref().unwrap_or("-"));
    println!(
        "Assignees:    {}",
        if task.assignees.is_empty() {
            "-".to_string()
        } else {
            task.assignees.join(", ")
        }
    );
    println!(
        "Watchers:     {}",
        if task.watchers.is_empty() {
            "-".to_string()
        } else {
            task.watchers.join(", ")
        }
    );
    println!("Created UTC:  {}", task.created_at.to_rfc3339());
    println!("Updated UTC:  {}", task.updated_at.to_rfc3339());
    println!(
        "Description:\n{}\n",
        task.description.as_deref().unwrap_or("-")
    );

    println!("Quality gates ({}):", task.current_department);
    let checklist = task.current_checklist();
    if checklist.is_empty() {
        println!("  (none defined; stage is vacuously complete)");
    } else {
        for item in checklist {
            let mark = if item.is_completed { "x" } else { " " };
            println!("  [{}] {:<12} {}", mark, item.id, item.label);
        }
    }

    if !task.production.issues.is_empty() {
        println!("\nIssues:");
        for issue in &task.production.issues {
            let state = match issue.resolved_at {
                Some(at) => format!("resolved {}", at.to_rfc3339()),
                None => "OPEN".to_string(),
            };
            println!(
                "  {:<8} [{}] {} - {} ({}, {})",
                issue.id, state, issue.description, issue.reported_by, issue.department, issue.kind
            );
        }
    }

    if !task.subtasks.is_empty() {
        println!("\nSubtasks:");
        print_subtasks(&task.subtasks, 1);
    }

    if !task.comments.is_empty() {
        println!("\nComments:");
        for c in &task.comments {
            println!("  {} ({}): {}", c.user_name, c.timestamp.to_rfc3339(), c.text);
        }
    }

    if !task.activities.is_empty() {
        println!("\nActivity (newest first):");
        for a in &task.activities {
            println!("  {}  {} - {}", a.timestamp.to_rfc3339(), a.user_name, a.action);
        }
    }
}

fn print_subtasks(subtasks: &[Subtask], depth: usize) {
    for st in subtasks {
        let mark = if st.is_completed { "x" } else { " " };
        println!("{}[{}] {} ({})", "  ".repeat(depth), mark, st.title, st.id);
        print_subtasks(&st.subtasks, depth + 1);
    }
}

/// Toggle a quality-gate checklist item on an operation.
pub fn cmd_check(
    store: &mut Store,
    path: &Path,
    actor: &User,
    id: String,
    item: String,
    department: Option<Department>,
) {
    let task_id = resolve_or_exit(&id, store);
    let Some(task) = store.get(task_id) else {
        eprintln!("Operation {} not found.", task_id);
        std::process::exit(1);
    };
    if !auth::can_edit_stage(actor, task) {
        eprintln!(
            "{} may not edit the {} stage of operation {} (wrong department, or work is halted).",
            actor.name, task.current_department, task_id
        );
        std::process::exit(1);
    }

    let department = department.unwrap_or(task.current_department);
    match workflow::toggle_checklist_item(task, department, &item, Utc::now()) {
        Ok(next) => {
            let flipped = next.production.checklists[&department]
                .iter()
                .find(|i| i.id == item)
                .map(|i| i.is_completed)
                .unwrap_or(false);
            store.upsert(next);
            save_or_exit(store, path);
            println!(
                "[{}] {} ({})",
                if flipped { "x" } else { " " },
                item,
                department
            );
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Manage gate templates and per-operation gate items.
pub fn cmd_gate(store: &mut Store, path: &Path, action: GateAction) {
    match action {
        GateAction::Add { department, label } => {
            store.gates.entry(department).or_default().push(label);
            save_or_exit(store, path);
            println!("Added gate template for {}", department);
        }
        GateAction::Rm {
            department,
            position,
        } => {
            let Some(labels) = store.gates.get_mut(&department) else {
                eprintln!("{} has no gate templates.", department);
                std::process::exit(1);
            };
            if position == 0 || position > labels.len() {
                eprintln!(
                    "{} has {} template(s); position {} is out of range.",
                    department,
                    labels.len(),
                    position
                );
                std::process::exit(1);
            }
            let removed = labels.remove(position - 1);
            save_or_exit(store, path);
            println!("Removed gate template '{}'", removed);
        }
        GateAction::List => {
            for department in WORKFLOW_ORDER {
                println!("{}:", department);
                match store.gates.get(&department) {
                    Some(labels) if !labels.is_empty() => {
                        for (i, label) in labels.iter().enumerate() {
                            println!("  {}. {}", i + 1, label);
                        }
                    }
                    _ => println!("  (no gates)"),
                }
            }
        }
        GateAction::Attach {
            id,
            department,
            label,
        } => {
            let task_id = resolve_or_exit(&id, store);
            let Some(task) = store.get_mut(task_id) else {
                eprintln!("Operation {} not found.", task_id);
                std::process::exit(1);
            };
            let items = task.production.checklists.entry(department).or_default();
            let slug = department.to_string().to_lowercase();
            let item_id = format!("{}-{}", slug, items.len() + 1);
            items.push(ChecklistItem {
                id: item_id.clone(),
                label,
                is_completed: false,
            });
            task.updated_at = Utc::now();
            save_or_exit(store, path);
            println!("Attached gate item {} to operation {}", item_id, task_id);
        }
    }
}

/// Advance an operation to the next department.
pub fn cmd_advance(store: &mut Store, path: &Path, actor: &User, id: String) {
    let task_id = resolve_or_exit(&id, store);
    let Some(task) = store.get(task_id) else {
        eprintln!("Operation {} not found.", task_id);
        std::process::exit(1);
    };
    match workflow::advance_department(task, actor, Utc::now()) {
        Ok(out) => {
            let to = out.task.current_department;
            store.upsert(out.task);
            dispatch_event(store, &out.event);
            save_or_exit(store, path);
            println!("Moved operation {} to {}", task_id, to);
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Send an operation back to an earlier department for rework.
pub fn cmd_back(
    store: &mut Store,
    path: &Path,
    actor: &User,
    id: String,
    to: Department,
    reason: String,
) {
    let task_id = resolve_or_exit(&id, store);
    let Some(task) = store.get(task_id) else {
        eprintln!("Operation {} not found.", task_id);
        std::process::exit(1);
    };
    match workflow::send_back(task, actor, to, &reason, Utc::now()) {
        Ok(out) => {
            let rework = out.task.production.rework_count;
            store.upsert(out.task);
            dispatch_event(store, &out.event);
            save_or_exit(store, path);
            println!("Sent operation {} back to {} (rework #{})", task_id, to, rework);
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Report a production issue and halt the operation.
pub fn cmd_block(
    store: &mut Store,
    path: &Path,
    actor: &User,
    id: String,
    description: String,
    kind: IssueType,
    department: Option<Department>,
) {
    let task_id = resolve_or_exit(&id, store);
    let Some(task) = store.get(task_id) else {
        eprintln!("Operation {} not found.", task_id);
        std::process::exit(1);
    };
    let report = IssueReport {
        department,
        description,
        kind,
    };
    match workflow::report_issue(task, actor, report, Utc::now()) {
        Ok(out) => {
            store.upsert(out.task);
            dispatch_event(store, &out.event);
            save_or_exit(store, path);
            println!("Operation {} halted.", task_id);
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Resolve all open issues on an operation and resume work.
pub fn cmd_resolve(store: &mut Store, path: &Path, actor: &User, id: String) {
    if !auth::can_resolve_issues(actor) {
        eprintln!("Resolving issues requires an admin; {} is a {}.", actor.name, actor.role);
        std::process::exit(1);
    }
    let task_id = resolve_or_exit(&id, store);
    let Some(task) = store.get(task_id) else {
        eprintln!("Operation {} not found.", task_id);
        std::process::exit(1);
    };
    match workflow::resolve_issues(task, actor, Utc::now()) {
        Ok(out) => {
            store.upsert(out.task);
            dispatch_event(store, &out.event);
            save_or_exit(store, path);
            println!("Operation {} resumed.", task_id);
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Close an operation after final quality approval.
pub fn cmd_done(store: &mut Store, path: &Path, actor: &User, id: String) {
    let task_id = resolve_or_exit(&id, store);
    let Some(task) = store.get(task_id) else {
        eprintln!("Operation {} not found.", task_id);
        std::process::exit(1);
    };
    match workflow::mark_done(task, actor, Utc::now()) {
        Ok(out) => {
            store.upsert(out.task);
            dispatch_event(store, &out.event);
            save_or_exit(store, path);
            println!("Operation {} complete.", task_id);
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Update an existing operation's fields.
pub fn cmd_update(
    store: &mut Store,
    path: &Path,
    actor: &User,
    id: String,
    title: Option<String>,
    desc: Option<String>,
    priority: Option<Priority>,
    list: Option<String>,
    status: Option<Status>,
    add_assignees: Vec<String>,
    rm_assignees: Vec<String>,
    watch: bool,
    unwatch: bool,
) {
    // Blocked and Done are owned by the workflow engine; setting them here
    // would strand the issue list or skip the final sign-off.
    if matches!(status, Some(Status::Blocked)) {
        eprintln!("Use 'sf block' to halt an operation with a recorded issue.");
        std::process::exit(1);
    }
    if matches!(status, Some(Status::Done)) {
        eprintln!("Use 'sf done' to close an operation after final approval.");
        std::process::exit(1);
    }

    let task_id = resolve_or_exit(&id, store);
    let Some(t) = store.get_mut(task_id) else {
        eprintln!("Operation {} not found.", task_id);
        std::process::exit(1);
    };
    if let Some(s) = title {
        t.title = s;
    }
    if let Some(d) = desc {
        t.description = if d.is_empty() { None } else { Some(d) };
    }
    if let Some(p) = priority {
        t.priority = p;
    }
    if let Some(l) = list {
        t.list_id = if l.trim().is_empty() { None } else { Some(l) };
    }
    if let Some(s) = status {
        if t.status == Status::Blocked {
            eprintln!("Operation {} is halted; resolve its issues first.", task_id);
            std::process::exit(1);
        }
        t.status = s;
    }
    for name in add_assignees {
        if !t.assignees.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
            t.assignees.push(name);
        }
    }
    for name in rm_assignees {
        t.assignees.retain(|n| !n.eq_ignore_ascii_case(&name));
    }
    if watch && !t.watchers.contains(&actor.name) {
        t.watchers.push(actor.name.clone());
    }
    if unwatch {
        t.watchers.retain(|n| n != &actor.name);
    }

    t.updated_at = Utc::now();
    save_or_exit(store, path);
    println!("Updated operation {}", task_id);
}

/// Add a comment to an operation.
pub fn cmd_comment(store: &mut Store, path: &Path, actor: &User, id: String, text: String) {
    if text.trim().is_empty() {
        eprintln!("Comment text must not be empty.");
        std::process::exit(1);
    }
    let task_id = resolve_or_exit(&id, store);
    let Some(t) = store.get_mut(task_id) else {
        eprintln!("Operation {} not found.", task_id);
        std::process::exit(1);
    };
    let now = Utc::now();
    t.comments.push(TaskComment {
        id: format!("cmt-{}", t.comments.len() + 1),
        user_name: actor.name.clone(),
        text,
        timestamp: now,
    });
    t.updated_at = now;
    save_or_exit(store, path);
    println!("Commented on operation {}", task_id);
}

/// Handle subtask management commands.
pub fn cmd_subtask(store: &mut Store, path: &Path, action: SubtaskAction) {
    match action {
        SubtaskAction::Add { id, title, parent } => {
            let task_id = resolve_or_exit(&id, store);
            let Some(t) = store.get_mut(task_id) else {
                eprintln!("Operation {} not found.", task_id);
                std::process::exit(1);
            };
            let sub_id = format!("sub-{}", count_subtasks(&t.subtasks) + 1);
            let subtask = Subtask {
                id: sub_id.clone(),
                title,
                is_completed: false,
                subtasks: Vec::new(),
            };
            match parent {
                Some(parent_id) => {
                    let Some(parent) = find_subtask_mut(&mut t.subtasks, &parent_id) else {
                        eprintln!("Subtask '{}' not found on operation {}.", parent_id, task_id);
                        std::process::exit(1);
                    };
                    parent.subtasks.push(subtask);
                }
                None => t.subtasks.push(subtask),
            }
            t.updated_at = Utc::now();
            save_or_exit(store, path);
            println!("Added subtask {} to operation {}", sub_id, task_id);
        }
        SubtaskAction::Toggle { id, subtask } => {
            let task_id = resolve_or_exit(&id, store);
            let Some(t) = store.get_mut(task_id) else {
                eprintln!("Operation {} not found.", task_id);
                std::process::exit(1);
            };
            let Some(st) = find_subtask_mut(&mut t.subtasks, &subtask) else {
                eprintln!("Subtask '{}' not found on operation {}.", subtask, task_id);
                std::process::exit(1);
            };
            st.is_completed = !st.is_completed;
            let done = st.is_completed;
            t.updated_at = Utc::now();
            save_or_exit(store, path);
            println!("[{}] {}", if done { "x" } else { " " }, subtask);
        }
    }
}

/// Handle user management commands.
pub fn cmd_user(store: &mut Store, path: &Path, action: UserAction) {
    match action {
        UserAction::Add {
            name,
            role,
            department,
        } => {
            if store.find_user(&name).is_some() {
                eprintln!("User '{}' already exists.", name);
                std::process::exit(1);
            }
            store.users.push(User {
                name: name.clone(),
                role,
                department,
            });
            save_or_exit(store, path);
            println!("Added user {}", name);
        }
        UserAction::List => {
            println!("{:<20} {:<12} {}", "Name", "Role", "Department");
            for u in &store.users {
                println!(
                    "{:<20} {:<12} {}",
                    truncate(&u.name, 20),
                    u.role.to_string(),
                    u.department.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
                );
            }
        }
    }
}

/// Handle space and list management commands.
pub fn cmd_space(store: &mut Store, path: &Path, action: SpaceAction) {
    match action {
        SpaceAction::Add { name, department } => {
            let id = slugify(&name);
            if store.spaces.iter().any(|s| s.id == id) {
                eprintln!("Space '{}' already exists.", id);
                std::process::exit(1);
            }
            store.spaces.push(Space {
                id: id.clone(),
                name,
                department,
                lists: Vec::new(),
            });
            save_or_exit(store, path);
            println!("Added space {}", id);
        }
        SpaceAction::AddList { space, name } => {
            let Some(s) = store
                .spaces
                .iter_mut()
                .find(|s| s.id == space || s.name.eq_ignore_ascii_case(&space))
            else {
                eprintln!("Space '{}' not found.", space);
                std::process::exit(1);
            };
            let id = slugify(&name);
            if s.lists.iter().any(|l| l.id == id) {
                eprintln!("List '{}' already exists in space {}.", id, s.id);
                std::process::exit(1);
            }
            s.lists.push(List {
                id: id.clone(),
                name,
            });
            save_or_exit(store, path);
            println!("Added list {}", id);
        }
        SpaceAction::List => {
            if store.spaces.is_empty() {
                println!("No spaces defined.");
                return;
            }
            for s in &store.spaces {
                println!("{} ({}, {})", s.name, s.id, s.department);
                for l in &s.lists {
                    println!("  - {} ({})", l.name, l.id);
                }
            }
        }
    }
}

/// Show stored workflow notifications.
pub fn cmd_notifications(store: &mut Store, path: &Path, all: bool, read: bool) {
    let shown: Vec<&Notification> = store
        .notifications
        .iter()
        .filter(|n| all || !n.is_read)
        .collect();
    if shown.is_empty() {
        println!("No notifications.");
    } else {
        for n in &shown {
            let marker = if n.is_read { " " } else { "*" };
            println!(
                "{} {:<4} {}  {} - {}",
                marker,
                n.id,
                n.created_at.to_rfc3339(),
                n.title,
                n.message
            );
        }
    }
    if read {
        for n in store.notifications.iter_mut() {
            n.is_read = true;
        }
        save_or_exit(store, path);
    }
}

/// Export operations to CSV format.
pub fn cmd_export(store: &Store, output: Option<String>, all: bool) {
    let output_path = output.unwrap_or_else(|| "operations.csv".to_string());

    let tasks: Vec<&Task> = store
        .tasks
        .iter()
        .filter(|t| all || t.status != Status::Done)
        .collect();

    let mut csv_content = String::new();
    csv_content.push_str(
        "ID,Title,Stage,Status,Priority,List,Assignees,Rework,OpenIssues,CreatedUTC,UpdatedUTC,Description\n",
    );

    // Escape CSV fields that contain commas or quotes
    let escape_csv = |s: &str| {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    };

    let task_count = tasks.len();
    for task in &tasks {
        let assignees = if task.assignees.is_empty() {
            "-".to_string()
        } else {
            task.assignees.join(";")
        };
        let list = task.list_id.as_deref().unwrap_or("-");
        let description = task.description.as_deref().unwrap_or("-");

        csv_content.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{}\n",
            task.id,
            escape_csv(&task.title),
            task.current_department,
            task.status,
            task.priority,
            escape_csv(list),
            escape_csv(&assignees),
            task.production.rework_count,
            task.open_issue_count(),
            escape_csv(&task.created_at.to_rfc3339()),
            escape_csv(&task.updated_at.to_rfc3339()),
            escape_csv(description)
        ));
    }

    match std::fs::write(&output_path, csv_content) {
        Ok(_) => {
            println!("Exported {} operation(s) to {}", task_count, output_path);
        }
        Err(e) => {
            eprintln!("Failed to write CSV file: {}", e);
            std::process::exit(1);
        }
    }
}

/// Create a timestamped backup of a workspace file.
pub fn create_backup(db_path: &Path) -> Result<String, std::io::Error> {
    if !db_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Workspace file does not exist",
        ));
    }

    let parent_dir = db_path.parent().unwrap_or_else(|| Path::new("."));
    let backup_dir = parent_dir.join("backup");
    std::fs::create_dir_all(&backup_dir)?;

    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let file_name = db_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("workspace.json");

    let backup_path = backup_dir.join(format!("{}_{}", timestamp, file_name));
    std::fs::copy(db_path, &backup_path)?;

    Ok(backup_path.to_string_lossy().to_string())
}

/// Create a backup of the current workspace, or of all of them.
pub fn cmd_backup(db_path: &Path, all: bool) {
    if all {
        let data_dir = db_path.parent().unwrap_or_else(|| Path::new("."));
        cmd_backup_all(data_dir);
        return;
    }

    match create_backup(db_path) {
        Ok(backup_path) => {
            println!("Backup created: {}", backup_path);
        }
        Err(e) => {
            eprintln!("Failed to create backup: {}", e);
            std::process::exit(1);
        }
    }
}

/// Backup all workspaces in the data directory.
pub fn cmd_backup_all(data_dir: &Path) {
    use crate::workspace::discover_workspaces;

    let workspaces = discover_workspaces(data_dir).unwrap_or_else(|e| {
        eprintln!("Failed to discover workspaces: {}", e);
        std::process::exit(1);
    });

    if workspaces.is_empty() {
        println!("No workspaces found to backup.");
        return;
    }

    let mut success_count = 0;
    let total_count = workspaces.len();

    for ws in &workspaces {
        match create_backup(&ws.file_path) {
            Ok(backup_path) => {
                println!("Backed up {}: {}", ws.display_name, backup_path);
                success_count += 1;
            }
            Err(e) => {
                eprintln!("Failed to backup {}: {}", ws.display_name, e);
            }
        }
    }

    println!(
        "Backup completed: {}/{} workspaces backed up successfully.",
        success_count, total_count
    );
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

/// Print operations in a formatted table.
pub fn print_table(tasks: &[&Task]) {
    println!(
        "{:<5} {:<12} {:<13} {:<7} {:<6} {:<4} {}",
        "ID", "Stage", "Status", "Pri", "Gates", "Iss", "Title [assignees]"
    );
    for t in tasks {
        let (done, total) = workflow::checklist_progress(t);
        let assignees = if t.assignees.is_empty() {
            String::new()
        } else {
            format!(" [{}]", t.assignees.join(","))
        };
        println!(
            "{:<5} {:<12} {:<13} {:<7} {:<6} {:<4} {}{}",
            t.id,
            t.current_department.to_string(),
            t.status.to_string(),
            t.priority.to_string(),
            format!("{}/{}", done, total),
            t.open_issue_count(),
            t.title,
            assignees
        );
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

/// Lowercase id from a display name, hyphen-separated.
fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}
