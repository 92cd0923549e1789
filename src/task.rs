//! Task data structures for the production workflow.
//!
//! This module defines the core `Task` struct that represents a single factory
//! operation with all its associated state: pipeline position, quality-gate
//! checklists, production issues and the audit trail.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::*;

/// A single quality-gate condition for one department stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub label: String,
    pub is_completed: bool,
}

/// A recorded technical problem that halts work until resolved.
///
/// `resolved_at` stays unset while the issue is open. The issue list is an
/// audit trail: entries are appended and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionIssue {
    pub id: String,
    pub reported_by: String,
    pub department: Department,
    pub description: String,
    pub kind: IssueType,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Audit-log entry describing a state change or user action, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub user_name: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// A discussion entry on an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskComment {
    pub id: String,
    pub user_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A nested work item inside an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub is_completed: bool,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

/// Production-side state attached to every operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionData {
    /// Quality-gate checklist per department. A missing or empty entry means
    /// the stage has no gates and is vacuously complete.
    #[serde(default)]
    pub checklists: BTreeMap<Department, Vec<ChecklistItem>>,
    #[serde(default)]
    pub issues: Vec<ProductionIssue>,
    /// Incremented only when the operation is explicitly sent backward.
    #[serde(default)]
    pub rework_count: u32,
}

/// A factory operation moving through the department pipeline.
///
/// `current_department` says where the operation sits in the pipeline;
/// `status` says what state it is in within that stage. The two are
/// independent axes. Operations are never hard-deleted by the workflow; they
/// persist until the workspace store is reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    pub current_department: Department,
    pub priority: Priority,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub watchers: Vec<String>,
    pub list_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub production: ProductionData,
    #[serde(default)]
    pub comments: Vec<TaskComment>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl Task {
    /// Checklist for the operation's current stage; empty when none defined.
    pub fn current_checklist(&self) -> &[ChecklistItem] {
        self.production
            .checklists
            .get(&self.current_department)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Issues still waiting for resolution.
    pub fn open_issue_count(&self) -> usize {
        self.production
            .issues
            .iter()
            .filter(|i| i.resolved_at.is_none())
            .count()
    }
}

/// Find a subtask by id anywhere in a nested subtask tree.
pub fn find_subtask_mut<'a>(subtasks: &'a mut [Subtask], id: &str) -> Option<&'a mut Subtask> {
    for st in subtasks.iter_mut() {
        if st.id == id {
            return Some(st);
        }
        if let Some(found) = find_subtask_mut(&mut st.subtasks, id) {
            return Some(found);
        }
    }
    None
}

/// Total number of subtasks in a nested tree.
pub fn count_subtasks(subtasks: &[Subtask]) -> usize {
    subtasks
        .iter()
        .map(|st| 1 + count_subtasks(&st.subtasks))
        .sum()
}
