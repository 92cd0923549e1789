//! The production workflow engine.
//!
//! Pure transitions over `Task`: every operation takes the current task by
//! reference plus the acting user and a caller-supplied timestamp, and returns
//! either the next task value or a `WorkflowError`. The input is never
//! mutated, so a refused transition leaves no partial update behind.
//!
//! Persistence and notification dispatch belong to the caller. Transitions
//! that should reach users are returned as a `WorkflowEvent` alongside the new
//! task value. Authorization is also the caller's job (see `auth`); the engine
//! records the acting user as opaque metadata in issues and activities.
//!
//! The one invariant enforced here: an operation cannot advance to the next
//! department until its current department's quality checklist is fully
//! satisfied, and an operation blocked by an open issue cannot advance until
//! the issue is resolved. `Blocked` is entered only through `report_issue` and
//! left only through `resolve_issues`.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::auth::User;
use crate::fields::{Department, IssueType, Status};
use crate::task::{Activity, ProductionIssue, Task};

/// Why a workflow transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// The current stage still has open quality-gate items.
    #[error("quality checklist for {department} has {remaining} open item(s)")]
    ChecklistIncomplete {
        department: Department,
        remaining: usize,
    },
    /// Already at the last stage of the pipeline.
    #[error("{0} is the final stage; close the operation with done instead")]
    TerminalDepartment(Department),
    /// Blocked operations cannot move until their issues are resolved.
    #[error("operation is blocked by an open production issue")]
    TaskBlocked,
    #[error("operation has no open production issue to resolve")]
    NotBlocked,
    #[error("issue description must not be empty")]
    EmptyDescription,
    /// Invalid checklist item or department id; indicates a caller bug.
    #[error("no checklist item '{item_id}' in {department}")]
    ItemNotFound {
        department: Department,
        item_id: String,
    },
    #[error("operation is in {0}; only the final stage can sign off completion")]
    NotInFinalStage(Department),
    #[error("{target} is not an earlier stage than {current}")]
    InvalidRework {
        current: Department,
        target: Department,
    },
    #[error("operation is already done")]
    AlreadyDone,
}

/// State transitions the caller should surface to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    IssueReported {
        task_id: u64,
        department: Department,
        description: String,
    },
    IssueResolved {
        task_id: u64,
        resolved: usize,
    },
    DepartmentAdvanced {
        task_id: u64,
        from: Department,
        to: Department,
    },
    SentBack {
        task_id: u64,
        from: Department,
        to: Department,
    },
    TaskCompleted {
        task_id: u64,
    },
}

/// A successful transition: the next task value plus the event to surface.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub task: Task,
    pub event: WorkflowEvent,
}

/// Caller-supplied details for a new production issue.
///
/// When `department` is unset, the reporter's own department is used, falling
/// back to the operation's current stage.
#[derive(Debug, Clone)]
pub struct IssueReport {
    pub department: Option<Department>,
    pub description: String,
    pub kind: IssueType,
}

/// True when the current stage's checklist is empty or every item is done.
pub fn is_checklist_complete(task: &Task) -> bool {
    task.current_checklist().iter().all(|i| i.is_completed)
}

/// Completed and total gate counts for the current stage.
pub fn checklist_progress(task: &Task) -> (usize, usize) {
    let list = task.current_checklist();
    let done = list.iter().filter(|i| i.is_completed).count();
    (done, list.len())
}

/// Flip one checklist item. No other workflow state changes.
pub fn toggle_checklist_item(
    task: &Task,
    department: Department,
    item_id: &str,
    now: DateTime<Utc>,
) -> Result<Task, WorkflowError> {
    let mut next = task.clone();
    let not_found = || WorkflowError::ItemNotFound {
        department,
        item_id: item_id.to_string(),
    };
    let item = next
        .production
        .checklists
        .get_mut(&department)
        .ok_or_else(not_found)?
        .iter_mut()
        .find(|i| i.id == item_id)
        .ok_or_else(not_found)?;
    item.is_completed = !item.is_completed;
    next.updated_at = now;
    Ok(next)
}

/// Record a production issue and halt the operation.
///
/// Each call appends a separate issue; several concurrent problems can be on
/// file at once, while the task-level `Blocked` flag stays set until all of
/// them are resolved together.
pub fn report_issue(
    task: &Task,
    user: &User,
    report: IssueReport,
    now: DateTime<Utc>,
) -> Result<Outcome, WorkflowError> {
    if report.description.trim().is_empty() {
        return Err(WorkflowError::EmptyDescription);
    }
    let department = report
        .department
        .or(user.department)
        .unwrap_or(task.current_department);
    let mut next = task.clone();
    next.production.issues.push(ProductionIssue {
        id: format!("iss-{}", next.production.issues.len() + 1),
        reported_by: user.name.clone(),
        department,
        description: report.description.clone(),
        kind: report.kind,
        created_at: now,
        resolved_at: None,
    });
    next.status = Status::Blocked;
    record_activity(
        &mut next,
        user,
        &format!("halted production: {}", report.description),
        now,
    );
    next.updated_at = now;
    Ok(Outcome {
        event: WorkflowEvent::IssueReported {
            task_id: next.id,
            department,
            description: report.description,
        },
        task: next,
    })
}

/// Resolve every open issue at once and resume work.
pub fn resolve_issues(
    task: &Task,
    user: &User,
    now: DateTime<Utc>,
) -> Result<Outcome, WorkflowError> {
    if task.status != Status::Blocked {
        return Err(WorkflowError::NotBlocked);
    }
    let mut next = task.clone();
    let mut resolved = 0;
    for issue in next
        .production
        .issues
        .iter_mut()
        .filter(|i| i.resolved_at.is_none())
    {
        issue.resolved_at = Some(now);
        resolved += 1;
    }
    next.status = Status::InProgress;
    record_activity(&mut next, user, "resolved open issues and resumed production", now);
    next.updated_at = now;
    Ok(Outcome {
        event: WorkflowEvent::IssueResolved {
            task_id: next.id,
            resolved,
        },
        task: next,
    })
}

/// Hand the operation to the next department.
///
/// Refused while blocked, at the end of the pipeline, or with open gates.
pub fn advance_department(
    task: &Task,
    user: &User,
    now: DateTime<Utc>,
) -> Result<Outcome, WorkflowError> {
    if task.status == Status::Blocked {
        return Err(WorkflowError::TaskBlocked);
    }
    let from = task.current_department;
    let Some(to) = from.next() else {
        return Err(WorkflowError::TerminalDepartment(from));
    };
    if !is_checklist_complete(task) {
        let (done, total) = checklist_progress(task);
        return Err(WorkflowError::ChecklistIncomplete {
            department: from,
            remaining: total - done,
        });
    }
    let mut next = task.clone();
    next.current_department = to;
    next.status = Status::Todo;
    record_activity(
        &mut next,
        user,
        &format!("approved {from} quality gates; moved to {to}"),
        now,
    );
    next.updated_at = now;
    Ok(Outcome {
        event: WorkflowEvent::DepartmentAdvanced {
            task_id: next.id,
            from,
            to,
        },
        task: next,
    })
}

/// Send the operation back to an earlier stage for rework.
pub fn send_back(
    task: &Task,
    user: &User,
    to: Department,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Outcome, WorkflowError> {
    if task.status == Status::Blocked {
        return Err(WorkflowError::TaskBlocked);
    }
    if task.status == Status::Done {
        return Err(WorkflowError::AlreadyDone);
    }
    let from = task.current_department;
    if to >= from {
        return Err(WorkflowError::InvalidRework {
            current: from,
            target: to,
        });
    }
    let mut next = task.clone();
    next.current_department = to;
    next.status = Status::Todo;
    next.production.rework_count += 1;
    record_activity(
        &mut next,
        user,
        &format!("sent back from {from} to {to} for rework: {reason}"),
        now,
    );
    next.updated_at = now;
    Ok(Outcome {
        event: WorkflowEvent::SentBack {
            task_id: next.id,
            from,
            to,
        },
        task: next,
    })
}

/// Close the operation after the final stage's gates are satisfied.
pub fn mark_done(task: &Task, user: &User, now: DateTime<Utc>) -> Result<Outcome, WorkflowError> {
    if task.status == Status::Blocked {
        return Err(WorkflowError::TaskBlocked);
    }
    if task.status == Status::Done {
        return Err(WorkflowError::AlreadyDone);
    }
    if task.current_department.next().is_some() {
        return Err(WorkflowError::NotInFinalStage(task.current_department));
    }
    if !is_checklist_complete(task) {
        let (done, total) = checklist_progress(task);
        return Err(WorkflowError::ChecklistIncomplete {
            department: task.current_department,
            remaining: total - done,
        });
    }
    let mut next = task.clone();
    next.status = Status::Done;
    record_activity(
        &mut next,
        user,
        "passed final quality approval; operation complete",
        now,
    );
    next.updated_at = now;
    Ok(Outcome {
        event: WorkflowEvent::TaskCompleted { task_id: next.id },
        task: next,
    })
}

/// Prepend an audit-log entry. Ids are allocated from the append-only count.
pub fn record_activity(task: &mut Task, user: &User, action: &str, now: DateTime<Utc>) {
    let activity = Activity {
        id: format!("act-{}", task.activities.len() + 1),
        user_name: user.name.clone(),
        action: action.to_string(),
        timestamp: now,
    };
    task.activities.insert(0, activity);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;

    use super::*;
    use crate::fields::{Priority, Role};
    use crate::task::{ChecklistItem, ProductionData};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, hour, 0, 0).unwrap()
    }

    fn user(name: &str, role: Role, department: Option<Department>) -> User {
        User {
            name: name.to_string(),
            role,
            department,
        }
    }

    fn task_with_checklist(department: Department, items: &[(&str, &str, bool)]) -> Task {
        let mut checklists = BTreeMap::new();
        checklists.insert(
            department,
            items
                .iter()
                .map(|(id, label, done)| ChecklistItem {
                    id: id.to_string(),
                    label: label.to_string(),
                    is_completed: *done,
                })
                .collect(),
        );
        Task {
            id: 1,
            title: "Control cabinet frame".to_string(),
            description: None,
            status: Status::Todo,
            current_department: department,
            priority: Priority::Normal,
            assignees: Vec::new(),
            watchers: Vec::new(),
            list_id: None,
            created_at: at(8),
            updated_at: at(8),
            production: ProductionData {
                checklists,
                ..ProductionData::default()
            },
            comments: Vec::new(),
            subtasks: Vec::new(),
            activities: Vec::new(),
        }
    }

    #[test]
    fn empty_checklist_is_vacuously_complete() {
        let task = task_with_checklist(Department::Planning, &[]);
        assert!(is_checklist_complete(&task));

        let mut no_entry = task.clone();
        no_entry.production.checklists.clear();
        assert!(is_checklist_complete(&no_entry));
    }

    #[test]
    fn advance_refused_until_gates_closed() {
        let task = task_with_checklist(Department::Planning, &[("c1", "Review", false)]);
        let sam = user("Sam", Role::Technician, Some(Department::Planning));

        let err = advance_department(&task, &sam, at(9)).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::ChecklistIncomplete {
                department: Department::Planning,
                remaining: 1
            }
        );
        // The input is untouched by a refused transition.
        assert_eq!(task.current_department, Department::Planning);
        assert_eq!(task.status, Status::Todo);
        assert!(task.activities.is_empty());
    }

    #[test]
    fn toggle_then_advance_scenario() {
        let task = task_with_checklist(Department::Planning, &[("c1", "Review", false)]);
        let sam = user("Sam", Role::Technician, Some(Department::Planning));

        assert!(matches!(
            advance_department(&task, &sam, at(9)),
            Err(WorkflowError::ChecklistIncomplete { .. })
        ));

        let task = toggle_checklist_item(&task, Department::Planning, "c1", at(9)).unwrap();
        assert!(task.current_checklist()[0].is_completed);

        let out = advance_department(&task, &sam, at(10)).unwrap();
        assert_eq!(out.task.current_department, Department::Engineering);
        assert_eq!(out.task.status, Status::Todo);
        assert_eq!(
            out.event,
            WorkflowEvent::DepartmentAdvanced {
                task_id: 1,
                from: Department::Planning,
                to: Department::Engineering,
            }
        );
        // Handoff is recorded newest-first.
        assert!(out.task.activities[0].action.contains("moved to Engineering"));
    }

    #[test]
    fn advance_moves_exactly_one_stage() {
        let lead = user("Lead", Role::Admin, None);
        for from in [
            Department::Planning,
            Department::Engineering,
            Department::Procurement,
            Department::Production,
        ] {
            let task = task_with_checklist(from, &[]);
            let out = advance_department(&task, &lead, at(9)).unwrap();
            assert_eq!(out.task.current_department, from.next().unwrap());
            assert_eq!(out.task.status, Status::Todo);
        }
    }

    #[test]
    fn advance_from_final_stage_is_terminal() {
        let task = task_with_checklist(Department::Quality, &[]);
        let lead = user("Lead", Role::Admin, None);
        assert_eq!(
            advance_department(&task, &lead, at(9)).unwrap_err(),
            WorkflowError::TerminalDepartment(Department::Quality)
        );
    }

    #[test]
    fn report_issue_blocks_and_files_the_issue() {
        let mut task = task_with_checklist(Department::Production, &[]);
        task.status = Status::InProgress;
        let sam = user("Sam", Role::Technician, Some(Department::Production));

        let out = report_issue(
            &task,
            &sam,
            IssueReport {
                department: None,
                description: "Machine jam".to_string(),
                kind: IssueType::MachineFailure,
            },
            at(11),
        )
        .unwrap();

        assert_eq!(out.task.status, Status::Blocked);
        assert_eq!(out.task.production.issues.len(), 1);
        let issue = &out.task.production.issues[0];
        assert_eq!(issue.reported_by, "Sam");
        assert_eq!(issue.department, Department::Production);
        assert!(issue.resolved_at.is_none());
        assert!(out.task.activities[0].action.contains("Machine jam"));
        assert_eq!(
            out.event,
            WorkflowEvent::IssueReported {
                task_id: 1,
                department: Department::Production,
                description: "Machine jam".to_string(),
            }
        );
    }

    #[test]
    fn report_issue_requires_a_description() {
        let task = task_with_checklist(Department::Production, &[]);
        let sam = user("Sam", Role::Technician, None);
        let err = report_issue(
            &task,
            &sam,
            IssueReport {
                department: None,
                description: "   ".to_string(),
                kind: IssueType::Other,
            },
            at(11),
        )
        .unwrap_err();
        assert_eq!(err, WorkflowError::EmptyDescription);
    }

    #[test]
    fn repeated_reports_stack_issues() {
        let task = task_with_checklist(Department::Production, &[]);
        let sam = user("Sam", Role::Technician, Some(Department::Production));
        let report = |desc: &str| IssueReport {
            department: None,
            description: desc.to_string(),
            kind: IssueType::Other,
        };

        let once = report_issue(&task, &sam, report("Jam"), at(11)).unwrap().task;
        let twice = report_issue(&once, &sam, report("Out of sheet"), at(12))
            .unwrap()
            .task;

        assert_eq!(twice.production.issues.len(), 2);
        assert_eq!(twice.status, Status::Blocked);
        assert_eq!(twice.production.issues[0].id, "iss-1");
        assert_eq!(twice.production.issues[1].id, "iss-2");
        assert_eq!(twice.activities.len(), 2);
    }

    #[test]
    fn blocked_operation_cannot_advance_even_with_closed_gates() {
        let task = task_with_checklist(Department::Production, &[("p1", "Cut", true)]);
        let sam = user("Sam", Role::Technician, Some(Department::Production));
        let lead = user("Lead", Role::Admin, None);

        let blocked = report_issue(
            &task,
            &sam,
            IssueReport {
                department: None,
                description: "Machine jam".to_string(),
                kind: IssueType::MachineFailure,
            },
            at(11),
        )
        .unwrap()
        .task;
        assert!(is_checklist_complete(&blocked));
        assert_eq!(
            advance_department(&blocked, &lead, at(12)).unwrap_err(),
            WorkflowError::TaskBlocked
        );

        let resolved = resolve_issues(&blocked, &lead, at(13)).unwrap().task;
        assert_eq!(resolved.status, Status::InProgress);
        assert!(advance_department(&resolved, &lead, at(14)).is_ok());
    }

    #[test]
    fn resolve_clears_every_open_issue() {
        let task = task_with_checklist(Department::Production, &[]);
        let sam = user("Sam", Role::Technician, Some(Department::Production));
        let lead = user("Lead", Role::Admin, None);
        let report = |desc: &str| IssueReport {
            department: None,
            description: desc.to_string(),
            kind: IssueType::Other,
        };

        let blocked = report_issue(&task, &sam, report("Jam"), at(11)).unwrap().task;
        let blocked = report_issue(&blocked, &sam, report("Scrap"), at(12))
            .unwrap()
            .task;

        let out = resolve_issues(&blocked, &lead, at(13)).unwrap();
        assert_eq!(out.task.status, Status::InProgress);
        assert!(out
            .task
            .production
            .issues
            .iter()
            .all(|i| i.resolved_at == Some(at(13))));
        assert_eq!(
            out.event,
            WorkflowEvent::IssueResolved {
                task_id: 1,
                resolved: 2
            }
        );
    }

    #[test]
    fn resolve_requires_a_blocked_operation() {
        let task = task_with_checklist(Department::Production, &[]);
        let lead = user("Lead", Role::Admin, None);
        assert_eq!(
            resolve_issues(&task, &lead, at(13)).unwrap_err(),
            WorkflowError::NotBlocked
        );
    }

    #[test]
    fn toggle_is_its_own_inverse() {
        let task = task_with_checklist(Department::Planning, &[("c1", "Review", false)]);
        let original = task.current_checklist().to_vec();

        let once = toggle_checklist_item(&task, Department::Planning, "c1", at(9)).unwrap();
        assert!(once.current_checklist()[0].is_completed);
        let twice = toggle_checklist_item(&once, Department::Planning, "c1", at(10)).unwrap();
        assert_eq!(twice.current_checklist(), &original[..]);
    }

    #[test]
    fn toggle_unknown_item_is_a_caller_bug() {
        let task = task_with_checklist(Department::Planning, &[("c1", "Review", false)]);
        let err =
            toggle_checklist_item(&task, Department::Planning, "missing", at(9)).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::ItemNotFound {
                department: Department::Planning,
                item_id: "missing".to_string()
            }
        );
        // Same failure for a stage with no checklist at all.
        assert!(matches!(
            toggle_checklist_item(&task, Department::Quality, "c1", at(9)),
            Err(WorkflowError::ItemNotFound { .. })
        ));
    }

    #[test]
    fn send_back_counts_rework_and_only_goes_backward() {
        let task = task_with_checklist(Department::Quality, &[]);
        let lead = user("Lead", Role::Admin, None);

        let out = send_back(&task, &lead, Department::Production, "weld porosity", at(15))
            .unwrap();
        assert_eq!(out.task.current_department, Department::Production);
        assert_eq!(out.task.status, Status::Todo);
        assert_eq!(out.task.production.rework_count, 1);
        assert!(out.task.activities[0].action.contains("weld porosity"));

        assert_eq!(
            send_back(&out.task, &lead, Department::Quality, "x", at(16)).unwrap_err(),
            WorkflowError::InvalidRework {
                current: Department::Production,
                target: Department::Quality
            }
        );
        assert!(matches!(
            send_back(&out.task, &lead, Department::Production, "x", at(16)),
            Err(WorkflowError::InvalidRework { .. })
        ));
    }

    #[test]
    fn done_requires_final_stage_with_closed_gates() {
        let lead = user("Lead", Role::Admin, None);

        let early = task_with_checklist(Department::Production, &[]);
        assert_eq!(
            mark_done(&early, &lead, at(16)).unwrap_err(),
            WorkflowError::NotInFinalStage(Department::Production)
        );

        let open_gate = task_with_checklist(Department::Quality, &[("q1", "Measure", false)]);
        assert!(matches!(
            mark_done(&open_gate, &lead, at(16)),
            Err(WorkflowError::ChecklistIncomplete { .. })
        ));

        let ready = task_with_checklist(Department::Quality, &[("q1", "Measure", true)]);
        let out = mark_done(&ready, &lead, at(16)).unwrap();
        assert_eq!(out.task.status, Status::Done);
        assert_eq!(out.event, WorkflowEvent::TaskCompleted { task_id: 1 });
        assert_eq!(
            mark_done(&out.task, &lead, at(17)).unwrap_err(),
            WorkflowError::AlreadyDone
        );
    }

    #[test]
    fn full_pipeline_run() {
        let lead = user("Lead", Role::Admin, None);
        let mut task = task_with_checklist(Department::Planning, &[("c1", "Scope", false)]);
        task = toggle_checklist_item(&task, Department::Planning, "c1", at(9)).unwrap();

        while task.current_department.next().is_some() {
            task = advance_department(&task, &lead, at(10)).unwrap().task;
        }
        assert_eq!(task.current_department, Department::Quality);

        task = mark_done(&task, &lead, at(11)).unwrap().task;
        assert_eq!(task.status, Status::Done);
        // One entry per handoff plus the completion sign-off.
        assert_eq!(task.activities.len(), 5);
    }
}
