//! Workspace store and repository operations.
//!
//! This module provides the `Store` struct holding one workspace's tasks,
//! users, spaces, gate templates and notifications, persisted wholesale as a
//! single JSON snapshot. Workflow operations return new task values; callers
//! put them back with `upsert` and `save`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::auth::User;
use crate::fields::{Department, Role, WORKFLOW_ORDER};
use crate::notify::Notification;
use crate::task::{ChecklistItem, Task};

/// A named area of the floor grouping task lists, owned by one department.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub name: String,
    pub department: Department,
    #[serde(default)]
    pub lists: Vec<List>,
}

/// A task list inside a space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    pub id: String,
    pub name: String,
}

/// In-memory store for one workspace file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Store {
    #[serde(default)]
    pub spaces: Vec<Space>,
    /// Per-department gate templates applied to newly created operations.
    #[serde(default)]
    pub gates: BTreeMap<Department, Vec<String>>,
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

impl Store {
    /// Load a store from a JSON file, starting empty if the file is missing.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Store::default();
        }
        let mut buf = String::new();
        match File::open(path).and_then(|mut f| f.read_to_string(&mut buf)) {
            Ok(_) => match serde_json::from_str(&buf) {
                Ok(store) => store,
                Err(e) => {
                    eprintln!("Error parsing workspace, starting fresh: {e}");
                    Store::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading workspace, starting fresh: {e}");
                Store::default()
            }
        }
    }

    /// Save the store to a JSON file using atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        let data = serde_json::to_string_pretty(self).unwrap();
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// Fresh store carrying the factory default gate templates and a
    /// Supervisor admin, used when a new workspace file is created.
    pub fn seed() -> Self {
        let mut gates = BTreeMap::new();
        gates.insert(
            Department::Planning,
            vec![
                "Scope and measurements confirmed".to_string(),
                "Client drawings received".to_string(),
            ],
        );
        gates.insert(
            Department::Engineering,
            vec![
                "Production drawing issued".to_string(),
                "Material specification approved".to_string(),
            ],
        );
        gates.insert(
            Department::Procurement,
            vec![
                "Raw material reserved".to_string(),
                "Outsourced parts ordered".to_string(),
            ],
        );
        gates.insert(
            Department::Production,
            vec![
                "Cutting complete".to_string(),
                "Bending complete".to_string(),
                "Welding inspected".to_string(),
            ],
        );
        gates.insert(
            Department::Quality,
            vec![
                "Dimensions verified".to_string(),
                "Surface finish approved".to_string(),
            ],
        );
        Store {
            gates,
            users: vec![User {
                name: "Supervisor".to_string(),
                role: Role::Admin,
                department: None,
            }],
            ..Store::default()
        }
    }

    /// Generate the next available operation ID.
    pub fn next_id(&self) -> u64 {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    /// Get an operation by ID.
    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Get a mutable reference to an operation by ID.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Put a (possibly new) task value back into the store.
    pub fn upsert(&mut self, task: Task) {
        match self.tasks.iter().position(|t| t.id == task.id) {
            Some(i) => self.tasks[i] = task,
            None => self.tasks.push(task),
        }
    }

    /// Find a user by name, case-insensitively.
    pub fn find_user(&self, name: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.name.eq_ignore_ascii_case(name))
    }

    /// Instantiate the workspace gate templates into per-task checklists.
    pub fn instantiate_gates(&self) -> BTreeMap<Department, Vec<ChecklistItem>> {
        let mut checklists = BTreeMap::new();
        for &department in &WORKFLOW_ORDER {
            let Some(labels) = self.gates.get(&department) else {
                continue;
            };
            let slug = department.to_string().to_lowercase();
            let items = labels
                .iter()
                .enumerate()
                .map(|(i, label)| ChecklistItem {
                    id: format!("{}-{}", slug, i + 1),
                    label: label.clone(),
                    is_completed: false,
                })
                .collect();
            checklists.insert(department, items);
        }
        checklists
    }
}

/// Resolve an operation identifier (either ID or title) to a task ID.
/// Returns an error if the title has multiple matches and suggests using the
/// ID instead.
pub fn resolve_task_identifier(identifier: &str, store: &Store) -> Result<u64, String> {
    if let Ok(id) = identifier.parse::<u64>() {
        if store.get(id).is_some() {
            return Ok(id);
        } else {
            return Err(format!("Operation with ID {} not found", id));
        }
    }

    let matches: Vec<&Task> = store
        .tasks
        .iter()
        .filter(|task| task.title.eq_ignore_ascii_case(identifier))
        .collect();

    match matches.len() {
        0 => Err(format!("No operation found with title '{}'", identifier)),
        1 => Ok(matches[0].id),
        _ => {
            let mut error_msg = format!("Multiple operations found with title '{}':\n", identifier);
            for task in matches {
                error_msg.push_str(&format!(
                    "  ID {}: {} ({})\n",
                    task.id, task.title, task.current_department
                ));
            }
            error_msg.push_str("Please use the specific ID instead.");
            Err(error_msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::fields::{Priority, Status};
    use crate::task::ProductionData;

    fn task(id: u64, title: &str) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: None,
            status: Status::Todo,
            current_department: Department::Planning,
            priority: Priority::Normal,
            assignees: Vec::new(),
            watchers: Vec::new(),
            list_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            production: ProductionData::default(),
            comments: Vec::new(),
            subtasks: Vec::new(),
            activities: Vec::new(),
        }
    }

    #[test]
    fn next_id_starts_at_one_and_follows_max() {
        let mut store = Store::default();
        assert_eq!(store.next_id(), 1);
        store.tasks.push(task(4, "Frame"));
        assert_eq!(store.next_id(), 5);
    }

    #[test]
    fn upsert_replaces_by_id() {
        let mut store = Store::default();
        store.upsert(task(1, "Frame"));
        let mut renamed = task(1, "Frame rev B");
        renamed.status = Status::InProgress;
        store.upsert(renamed);
        assert_eq!(store.tasks.len(), 1);
        assert_eq!(store.tasks[0].title, "Frame rev B");
    }

    #[test]
    fn resolve_by_title_rejects_ambiguity() {
        let mut store = Store::default();
        store.tasks.push(task(1, "Frame"));
        store.tasks.push(task(2, "frame"));
        store.tasks.push(task(3, "Panel"));

        assert_eq!(resolve_task_identifier("3", &store), Ok(3));
        assert_eq!(resolve_task_identifier("Panel", &store), Ok(3));
        assert!(resolve_task_identifier("Frame", &store).is_err());
        assert!(resolve_task_identifier("99", &store).is_err());
    }

    #[test]
    fn seeded_gates_instantiate_unchecked() {
        let store = Store::seed();
        let checklists = store.instantiate_gates();
        assert_eq!(checklists.len(), 5);
        let planning = &checklists[&Department::Planning];
        assert_eq!(planning[0].id, "planning-1");
        assert!(planning.iter().all(|i| !i.is_completed));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floor_workspace.json");

        let mut store = Store::seed();
        store.tasks.push(task(1, "Frame"));
        store.save(&path).unwrap();

        let loaded = Store::load(&path);
        assert_eq!(loaded.tasks.len(), 1);
        assert_eq!(loaded.tasks[0].title, "Frame");
        assert_eq!(loaded.users[0].name, "Supervisor");
        assert_eq!(loaded.gates.len(), 5);
    }
}
