//! Tag model.
//!
//! Tags are named labels with a many-to-many relationship to issues.
//! Deleting a tag unlinks it from every issue but never deletes the
//! issues themselves.

use serde::{Deserialize, Serialize};

/// A named label applied to zero or more issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Unique identifier (`tag_` + 12 hex chars).
    pub id: String,

    /// Display name. May be empty, never absent.
    pub name: String,
}

impl Tag {
    /// Create a new tag with the default name.
    #[must_use]
    pub fn new() -> Self {
        let id = format!("tag_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);

        Self {
            id,
            name: "New tag".to_string(),
        }
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::new()
    }
}

/// A single field-level edit to a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEdit {
    Name(String),
}
