//! Notifications produced from workflow events.
//!
//! The engine never dispatches notifications itself; command handlers
//! translate the `WorkflowEvent` returned by a transition into a stored
//! `Notification` and a terminal line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::WorkflowEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    IssueReported,
    IssueResolved,
    DepartmentAdvanced,
    SentBack,
    TaskCompleted,
}

/// A stored, user-facing notice about a workflow transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub task_id: Option<u64>,
}

impl Notification {
    /// Build the notification for a workflow event.
    pub fn from_event(id: u64, event: &WorkflowEvent, now: DateTime<Utc>) -> Self {
        let (kind, title, message, task_id) = match event {
            WorkflowEvent::IssueReported {
                task_id,
                department,
                description,
            } => (
                NotificationKind::IssueReported,
                "Production halted",
                format!("Operation #{task_id} blocked in {department}: {description}"),
                *task_id,
            ),
            WorkflowEvent::IssueResolved { task_id, resolved } => (
                NotificationKind::IssueResolved,
                "Production resumed",
                format!("Operation #{task_id}: {resolved} issue(s) resolved"),
                *task_id,
            ),
            WorkflowEvent::DepartmentAdvanced { task_id, from, to } => (
                NotificationKind::DepartmentAdvanced,
                "Stage approved",
                format!("Operation #{task_id} moved from {from} to {to}"),
                *task_id,
            ),
            WorkflowEvent::SentBack { task_id, from, to } => (
                NotificationKind::SentBack,
                "Sent back for rework",
                format!("Operation #{task_id} returned from {from} to {to}"),
                *task_id,
            ),
            WorkflowEvent::TaskCompleted { task_id } => (
                NotificationKind::TaskCompleted,
                "Operation complete",
                format!("Operation #{task_id} passed final quality approval"),
                *task_id,
            ),
        };
        Notification {
            id,
            title: title.to_string(),
            message,
            kind,
            is_read: false,
            created_at: now,
            task_id: Some(task_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::fields::Department;

    #[test]
    fn issue_event_becomes_halt_notice() {
        let event = WorkflowEvent::IssueReported {
            task_id: 42,
            department: Department::Production,
            description: "Laser head misaligned".to_string(),
        };
        let n = Notification::from_event(1, &event, Utc::now());
        assert_eq!(n.kind, NotificationKind::IssueReported);
        assert_eq!(n.task_id, Some(42));
        assert!(!n.is_read);
        assert!(n.message.contains("Laser head misaligned"));
    }
}
