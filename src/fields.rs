//! Enumerations and field types for the production workflow.
//!
//! This module defines the structured data types used to categorise factory
//! operations: the department pipeline, task status values, priorities, issue
//! kinds and user roles.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Pipeline stages an operation passes through, in fixed production order.
///
/// Ordering follows pipeline position, so comparisons answer "earlier stage
/// than" directly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Department {
    #[serde(alias = "PLANNING")]
    Planning,
    #[serde(alias = "ENGINEERING")]
    Engineering,
    #[serde(alias = "PROCUREMENT")]
    Procurement,
    #[serde(alias = "PRODUCTION")]
    Production,
    #[serde(alias = "QUALITY")]
    Quality,
}

/// The department pipeline. "Next stage" is always the following entry;
/// there is nothing after Quality.
pub const WORKFLOW_ORDER: [Department; 5] = [
    Department::Planning,
    Department::Engineering,
    Department::Procurement,
    Department::Production,
    Department::Quality,
];

impl Department {
    /// Zero-based position in the pipeline.
    pub fn position(self) -> usize {
        match self {
            Department::Planning => 0,
            Department::Engineering => 1,
            Department::Procurement => 2,
            Department::Production => 3,
            Department::Quality => 4,
        }
    }

    /// The stage after this one, or `None` at the end of the pipeline.
    pub fn next(self) -> Option<Department> {
        WORKFLOW_ORDER.get(self.position() + 1).copied()
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Department::Planning => "Planning",
            Department::Engineering => "Engineering",
            Department::Procurement => "Procurement",
            Department::Production => "Production",
            Department::Quality => "Quality",
        };
        f.write_str(s)
    }
}

/// Activity state of an operation, independent of its department.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[serde(alias = "TODO")]
    Todo,
    #[serde(alias = "IN_PROGRESS")]
    InProgress,
    #[serde(alias = "BLOCKED")]
    Blocked,
    #[serde(alias = "UNDER_REVIEW")]
    UnderReview,
    #[serde(alias = "QUALITY_CHECK")]
    QualityCheck,
    #[serde(alias = "DONE")]
    Done,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Todo => "Todo",
            Status::InProgress => "InProgress",
            Status::Blocked => "Blocked",
            Status::UnderReview => "UnderReview",
            Status::QualityCheck => "QualityCheck",
            Status::Done => "Done",
        };
        f.write_str(s)
    }
}

/// Priority classification for operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    #[serde(alias = "URGENT")]
    Urgent,
    #[serde(alias = "HIGH")]
    High,
    #[serde(alias = "NORMAL")]
    Normal,
    #[serde(alias = "LOW")]
    Low,
}

impl Priority {
    /// Sort rank; urgent first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Urgent => "Urgent",
            Priority::High => "High",
            Priority::Normal => "Normal",
            Priority::Low => "Low",
        };
        f.write_str(s)
    }
}

/// Classification of a reported production issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    #[serde(alias = "MACHINE_FAILURE")]
    MachineFailure,
    #[serde(alias = "MATERIAL_SHORTAGE")]
    MaterialShortage,
    #[serde(alias = "DESIGN_MISMATCH")]
    DesignMismatch,
    #[serde(alias = "QUALITY_DEFECT")]
    QualityDefect,
    #[serde(alias = "OTHER")]
    Other,
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueType::MachineFailure => "Machine failure",
            IssueType::MaterialShortage => "Material shortage",
            IssueType::DesignMismatch => "Design mismatch",
            IssueType::QualityDefect => "Quality defect",
            IssueType::Other => "Other",
        };
        f.write_str(s)
    }
}

/// Access level of a workspace user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[serde(alias = "ADMIN")]
    Admin,
    #[serde(alias = "MANAGER")]
    Manager,
    #[serde(alias = "TECHNICIAN")]
    Technician,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Technician => "Technician",
        };
        f.write_str(s)
    }
}

/// Available sorting options for operation lists.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortKey {
    Priority,
    Stage,
    Id,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_order_is_linear() {
        assert_eq!(Department::Planning.next(), Some(Department::Engineering));
        assert_eq!(Department::Engineering.next(), Some(Department::Procurement));
        assert_eq!(Department::Procurement.next(), Some(Department::Production));
        assert_eq!(Department::Production.next(), Some(Department::Quality));
        assert_eq!(Department::Quality.next(), None);
    }

    #[test]
    fn pipeline_ordering_matches_position() {
        assert!(Department::Planning < Department::Quality);
        assert!(Department::Production > Department::Procurement);
        for (i, d) in WORKFLOW_ORDER.iter().enumerate() {
            assert_eq!(d.position(), i);
        }
    }
}
