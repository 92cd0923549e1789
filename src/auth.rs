//! Identity records and stage permissions.
//!
//! The workflow engine never checks permissions itself; command handlers ask
//! here first and pass the user through as opaque metadata.

use serde::{Deserialize, Serialize};

use crate::fields::{Department, Role, Status};
use crate::task::Task;

/// An acting workspace user. The name is embedded into issue and activity
/// records by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub role: Role,
    /// Home department; admins typically have none.
    pub department: Option<Department>,
}

/// Whether the user may work the operation's current stage: same department
/// or admin, and never while the operation is blocked.
pub fn can_edit_stage(user: &User, task: &Task) -> bool {
    let same_department = user.department == Some(task.current_department);
    (same_department || user.role == Role::Admin) && task.status != Status::Blocked
}

/// Resolving production issues is restricted to admins.
pub fn can_resolve_issues(user: &User) -> bool {
    user.role == Role::Admin
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::fields::Priority;
    use crate::task::ProductionData;

    fn task_in(department: Department, status: Status) -> Task {
        Task {
            id: 7,
            title: "Hopper liner".to_string(),
            description: None,
            status,
            current_department: department,
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

    fn user(role: Role, department: Option<Department>) -> User {
        User {
            name: "Sam".to_string(),
            role,
            department,
        }
    }

    #[test]
    fn same_department_may_edit() {
        let task = task_in(Department::Production, Status::InProgress);
        assert!(can_edit_stage(
            &user(Role::Technician, Some(Department::Production)),
            &task
        ));
        assert!(!can_edit_stage(
            &user(Role::Technician, Some(Department::Planning)),
            &task
        ));
    }

    #[test]
    fn admins_may_edit_any_stage() {
        let task = task_in(Department::Engineering, Status::Todo);
        assert!(can_edit_stage(&user(Role::Admin, None), &task));
        // Managers get no blanket access.
        assert!(!can_edit_stage(&user(Role::Manager, None), &task));
    }

    #[test]
    fn nobody_edits_a_blocked_stage() {
        let task = task_in(Department::Production, Status::Blocked);
        assert!(!can_edit_stage(&user(Role::Admin, None), &task));
        assert!(!can_edit_stage(
            &user(Role::Technician, Some(Department::Production)),
            &task
        ));
    }

    #[test]
    fn only_admins_resolve_issues() {
        assert!(can_resolve_issues(&user(Role::Admin, None)));
        assert!(!can_resolve_issues(&user(Role::Manager, None)));
        assert!(!can_resolve_issues(&user(
            Role::Technician,
            Some(Department::Quality)
        )));
    }
}
