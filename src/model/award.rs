//! Award model.
//!
//! Awards are static catalog entries, never mutated at runtime. The
//! criterion is a closed enum: catalog entries with a key this build
//! does not recognize map to `Unknown` and simply never unlock, so the
//! catalog can evolve ahead of the evaluator.

use serde::Deserialize;

/// The rule an award uses to decide whether it is earned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Criterion {
    /// Total number of issues.
    Issues,
    /// Number of completed issues.
    Closed,
    /// Total number of tags.
    Tags,
    /// Any key this build does not recognize. Never earned.
    Unknown,
}

impl From<String> for Criterion {
    fn from(value: String) -> Self {
        match value.as_str() {
            "issues" => Self::Issues,
            "closed" => Self::Closed,
            "tags" => Self::Tags,
            _ => Self::Unknown,
        }
    }
}

/// A gamification badge unlocked by an aggregate threshold.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Award {
    /// Unique name; doubles as the identifier.
    pub name: String,

    pub description: String,

    /// Color token for the presentation layer.
    pub color: String,

    pub criterion: Criterion,

    /// Threshold the criterion's aggregate must reach.
    pub value: i64,

    /// Icon token for the presentation layer.
    pub image: String,
}

impl Award {
    /// Identifier accessor, mirroring the catalog convention.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.name
    }
}
