//! Domain model types for the Compass compliance platform
//!
//! Status/priority/category enums are stored as lowercase TEXT in the
//! database; each enum provides `as_str`/`from_str` pairs for conversion.
//! Row structs mirror the table shapes created in `db::init`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Overdue,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Overdue => "overdue",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" | "in-progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "overdue" => Some(TaskStatus::Overdue),
            "cancelled" | "canceled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }

    /// Statuses that end a task's active life and warrant a score refresh.
    ///
    /// Ordinary progress transitions (pending → in_progress) are deliberately
    /// excluded: a full recompute per progress tick would be wasted work.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Overdue
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-entity control assignment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    NotStarted,
    InProgress,
    Completed,
    NeedsReview,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::NotStarted => "not_started",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::NeedsReview => "needs_review",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "not_started" | "not-started" => Some(AssignmentStatus::NotStarted),
            "in_progress" | "in-progress" => Some(AssignmentStatus::InProgress),
            "completed" => Some(AssignmentStatus::Completed),
            "needs_review" | "needs-review" => Some(AssignmentStatus::NeedsReview),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit gap finding status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapStatus {
    Open,
    InProgress,
    Closed,
    Accepted,
}

impl GapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapStatus::Open => "open",
            GapStatus::InProgress => "in_progress",
            GapStatus::Closed => "closed",
            GapStatus::Accepted => "accepted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(GapStatus::Open),
            "in_progress" | "in-progress" => Some(GapStatus::InProgress),
            "closed" => Some(GapStatus::Closed),
            "accepted" => Some(GapStatus::Accepted),
            _ => None,
        }
    }
}

impl std::fmt::Display for GapStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control / task / gap priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "critical" => Some(Priority::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit framework classification
///
/// Task instantiation defaults are keyed on this field rather than on
/// keyword matches against the framework's display name, so renaming a
/// framework never changes derived task content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkCategory {
    DataPrivacy,
    InfoSec,
    Healthcare,
    ServiceTrust,
    Financial,
    General,
}

impl FrameworkCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameworkCategory::DataPrivacy => "data_privacy",
            FrameworkCategory::InfoSec => "info_sec",
            FrameworkCategory::Healthcare => "healthcare",
            FrameworkCategory::ServiceTrust => "service_trust",
            FrameworkCategory::Financial => "financial",
            FrameworkCategory::General => "general",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "data_privacy" | "data-privacy" => Some(FrameworkCategory::DataPrivacy),
            "info_sec" | "info-sec" | "infosec" => Some(FrameworkCategory::InfoSec),
            "healthcare" => Some(FrameworkCategory::Healthcare),
            "service_trust" | "service-trust" => Some(FrameworkCategory::ServiceTrust),
            "financial" => Some(FrameworkCategory::Financial),
            "general" => Some(FrameworkCategory::General),
            _ => None,
        }
    }
}

impl std::fmt::Display for FrameworkCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Evidence,
    Policy,
    Report,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Evidence => "evidence",
            DocumentKind::Policy => "policy",
            DocumentKind::Report => "report",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "evidence" => Some(DocumentKind::Evidence),
            "policy" => Some(DocumentKind::Policy),
            "report" => Some(DocumentKind::Report),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Row structs
// ============================================================================

/// Regulatory framework catalog entry (immutable after seed/import)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Framework {
    pub guid: Uuid,
    pub name: String,
    pub region: Option<String>,
    pub category: FrameworkCategory,
}

/// Compliance requirement template belonging to a framework (read-only)
///
/// `priority` is kept as the raw stored string: the template is input the
/// orchestrator never writes back, and the CHECK constraints on the rows
/// derived from it decide whether the value is acceptable there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    pub guid: Uuid,
    pub framework_id: Uuid,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub category: Option<String>,
    pub guidance: Option<String>,
    /// Ordered list of evidence requirement descriptions (JSON array in DB)
    pub evidence_requirements: Vec<String>,
}

/// Per-entity materialization of a control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlAssignment {
    pub guid: Uuid,
    pub entity_id: Uuid,
    pub control_id: Uuid,
    pub status: AssignmentStatus,
    pub priority: Priority,
    pub completion_rate: i64,
}

/// Lightweight task view carried by events and cascade operations
///
/// The full task row lives in the `tasks` table; cascade logic only needs
/// the identifiers linking the task to its entity and (optional) control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRef {
    pub task_id: Uuid,
    pub entity_id: Uuid,
    pub control_id: Option<Uuid>,
}

/// Lightweight document view carried by events and cascade operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_id: Uuid,
    pub entity_id: Uuid,
    pub control_id: Option<Uuid>,
}

/// Lightweight audit gap view carried by events and cascade operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapRef {
    pub gap_id: Uuid,
    pub entity_id: Uuid,
}

/// Summary of a fan-out write pass (assignment sync / task instantiation)
///
/// Item-level failures are counted rather than aborting the pass, so the
/// report distinguishes "nothing to do" from "everything failed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Controls examined
    pub examined: usize,
    /// Rows actually created by this pass
    pub created: usize,
    /// Item-level failures (logged, pass continued)
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_roundtrip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Overdue,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_task_status_aliases() {
        assert_eq!(TaskStatus::from_str("in-progress"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::from_str("canceled"), Some(TaskStatus::Cancelled));
        assert_eq!(TaskStatus::from_str("nonsense"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::Overdue.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_framework_category_roundtrip() {
        for cat in [
            FrameworkCategory::DataPrivacy,
            FrameworkCategory::InfoSec,
            FrameworkCategory::Healthcare,
            FrameworkCategory::ServiceTrust,
            FrameworkCategory::Financial,
            FrameworkCategory::General,
        ] {
            assert_eq!(FrameworkCategory::from_str(cat.as_str()), Some(cat));
        }
    }

    #[test]
    fn test_gap_status_parse() {
        assert_eq!(GapStatus::from_str("closed"), Some(GapStatus::Closed));
        assert_eq!(GapStatus::from_str("OPEN"), Some(GapStatus::Open));
        assert_eq!(GapStatus::from_str(""), None);
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(Priority::High.to_string(), "high");
        assert_eq!(Priority::from_str("CRITICAL"), Some(Priority::Critical));
    }
}
