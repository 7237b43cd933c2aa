//! Issue model.
//!
//! Issues are the trackable work items: title, free-form content,
//! scheduling dates, a three-level priority, and a completion flag.
//! Tag membership lives in the store's junction table, not on the
//! record itself.

use serde::{Deserialize, Serialize};

/// Issue priority, ordinal from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Storage representation (0, 1, 2).
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }

    /// Map a stored value back; out-of-range values clamp to `Low`.
    #[must_use]
    pub const fn from_i64(value: i64) -> Self {
        match value {
            2 => Self::High,
            1 => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// A trackable work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Unique identifier (`issue_` + 12 hex chars), stable for the
    /// record's lifetime.
    pub id: String,

    /// Display title. May be empty, never absent.
    pub title: String,

    /// Free-form body text.
    pub content: String,

    /// Free-text location string.
    pub task_address: String,

    pub priority: Priority,

    pub completed: bool,

    /// Creation timestamp (Unix milliseconds), set once.
    pub creation_date: i64,

    /// Optional scheduled start (Unix milliseconds).
    pub start_date: Option<i64>,

    /// Optional due date (Unix milliseconds).
    pub due_date: Option<i64>,

    /// Last-mutation timestamp (Unix milliseconds). Non-decreasing:
    /// bumped on every field edit.
    pub modification_date: i64,
}

impl Issue {
    /// Create a new issue with default field values.
    #[must_use]
    pub fn new() -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let id = format!("issue_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);

        Self {
            id,
            title: "New issue".to_string(),
            content: String::new(),
            task_address: String::new(),
            priority: Priority::High,
            completed: false,
            creation_date: now,
            start_date: None,
            due_date: None,
            modification_date: now,
        }
    }

    /// Human-readable completion status.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        if self.completed { "Closed" } else { "Open" }
    }
}

impl Default for Issue {
    fn default() -> Self {
        Self::new()
    }
}

/// A single field-level edit to an issue.
///
/// Edits are staged by the save coordinator and applied together at
/// commit time; the last staged value for a field wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueEdit {
    Title(String),
    Content(String),
    TaskAddress(String),
    Priority(Priority),
    Completed(bool),
    StartDate(Option<i64>),
    DueDate(Option<i64>),
}

impl IssueEdit {
    /// The name of the column this edit targets.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::Content(_) => "content",
            Self::TaskAddress(_) => "task_address",
            Self::Priority(_) => "priority",
            Self::Completed(_) => "completed",
            Self::StartDate(_) => "start_date",
            Self::DueDate(_) => "due_date",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_issue_defaults() {
        let issue = Issue::new();

        assert!(issue.id.starts_with("issue_"));
        assert_eq!(issue.title, "New issue");
        assert_eq!(issue.priority, Priority::High);
        assert!(!issue.completed);
        assert_eq!(issue.creation_date, issue.modification_date);
        assert!(issue.start_date.is_none());
        assert!(issue.due_date.is_none());
    }

    #[test]
    fn test_status_label() {
        let mut issue = Issue::new();
        assert_eq!(issue.status(), "Open");

        issue.completed = true;
        assert_eq!(issue.status(), "Closed");
    }

    #[test]
    fn test_priority_round_trip() {
        for p in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(Priority::from_i64(p.as_i64()), p);
        }
        // Out-of-range clamps rather than failing
        assert_eq!(Priority::from_i64(99), Priority::Low);
        assert_eq!(Priority::from_i64(-1), Priority::Low);
    }
}
