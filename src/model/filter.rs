//! Filter model.
//!
//! A filter scopes the issue list one of two ways: bound to a tag
//! ("tag filter") or driven purely by a minimum-modification-date
//! threshold ("smart filter"). The two scopes are mutually exclusive.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Tag;

/// Seven days, in milliseconds.
const WEEK_MS: i64 = 7 * 86_400_000;

/// A sidebar filter: either tag-bound or a recency-threshold smart
/// filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub id: Uuid,
    pub name: String,

    /// Icon token for the presentation layer.
    pub icon: String,

    /// Minimum modification date (Unix milliseconds) for smart
    /// filters. `0` means "no threshold".
    pub min_modification_date: i64,

    /// Bound tag. When set, this filter matches issues linked to the
    /// tag and the threshold is ignored.
    pub tag: Option<Tag>,
}

impl Filter {
    /// The built-in "All issues" smart filter (no threshold).
    #[must_use]
    pub fn all() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "All issues".to_string(),
            icon: "tray".to_string(),
            min_modification_date: 0,
            tag: None,
        }
    }

    /// The built-in "Recent issues" smart filter (last seven days).
    #[must_use]
    pub fn recent() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "Recent issues".to_string(),
            icon: "clock".to_string(),
            min_modification_date: chrono::Utc::now().timestamp_millis() - WEEK_MS,
            tag: None,
        }
    }

    /// A filter bound to a tag.
    #[must_use]
    pub fn for_tag(tag: Tag) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: tag.name.clone(),
            icon: "bookmark".to_string(),
            min_modification_date: 0,
            tag: Some(tag),
        }
    }
}

// Identity is the id alone, so a renamed tag filter stays selected.
impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Filter {}

impl Hash for Filter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_has_no_threshold() {
        let filter = Filter::all();
        assert_eq!(filter.min_modification_date, 0);
        assert!(filter.tag.is_none());
    }

    #[test]
    fn test_recent_threshold_is_one_week() {
        let now = chrono::Utc::now().timestamp_millis();
        let filter = Filter::recent();

        let age = now - filter.min_modification_date;
        assert!((age - WEEK_MS).abs() < 1_000, "threshold should be ~7 days ago");
    }

    #[test]
    fn test_equality_is_by_id() {
        let mut a = Filter::all();
        let b = a.clone();
        a.name = "Renamed".to_string();

        assert_eq!(a, b);
        assert_ne!(Filter::all(), Filter::all(), "distinct ids never compare equal");
    }
}
