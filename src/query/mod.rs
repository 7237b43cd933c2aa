//! Filter engine.
//!
//! Compiles a [`FilterSpec`] into one SQL conjunction against the
//! entity store and returns an ordered result. Each predicate group is
//! independent and optional; absent groups impose nothing, so the
//! default spec resolves to every issue in the store.

use rusqlite::ToSql;

use crate::error::{Error, Result};
use crate::model::{Filter, Issue, Priority, Tag};
use crate::storage::Store;

/// Completion-status filter for advanced filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Open,
    Closed,
}

/// Sort key for resolved results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreationDate,
    ModificationDate,
}

impl SortField {
    const fn column(self) -> &'static str {
        match self {
            Self::CreationDate => "creation_date",
            Self::ModificationDate => "modification_date",
        }
    }
}

/// The complete, explicit filter state for one resolution.
///
/// A transient value object owned by the session: the coordinator
/// holds the current spec as injected configuration and passes it to
/// [`resolve`], instead of publishing ambient filter globals. The
/// default spec is a no-op on every axis.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    /// The selected sidebar filter (smart or tag-bound).
    pub filter: Filter,

    /// Free-text search over title and content. Ignored when blank.
    pub search_text: String,

    /// Selected tag tokens (tag ids). An issue must be linked to ALL
    /// of them: conjunction is the canonical behavior, not union.
    pub tokens: Vec<String>,

    /// Whether the advanced predicates (priority, status) apply.
    pub filter_enabled: bool,

    /// Priority to match exactly; `None` means any.
    pub priority: Option<Priority>,

    pub status: StatusFilter,

    pub sort: SortField,

    /// Sort direction: newest first when set.
    pub newest_first: bool,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            filter: Filter::all(),
            search_text: String::new(),
            tokens: Vec::new(),
            filter_enabled: false,
            priority: None,
            status: StatusFilter::All,
            sort: SortField::CreationDate,
            newest_first: true,
        }
    }
}

const ISSUE_COLUMNS: &str = "id, title, content, task_address, priority, completed,
                             creation_date, start_date, due_date, modification_date";

/// Resolve a filter spec to an ordered list of issues.
///
/// Builds a conjunction of predicate groups:
/// 1. scope: the filter's bound tag, or else its modification-date
///    threshold (strictly either/or);
/// 2. free text: case-insensitive substring on title or content;
/// 3. tokens: membership in every selected tag;
/// 4. advanced: priority and status equality, only when enabled.
///
/// Ordering is by the selected sort field and direction only; callers
/// needing a total order must impose their own tie-break.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn resolve(store: &Store, spec: &FilterSpec) -> Result<Vec<Issue>> {
    let mut sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE 1=1");
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    // Scope: tag membership or recency threshold, never both
    if let Some(tag) = &spec.filter.tag {
        sql.push_str(
            " AND EXISTS (SELECT 1 FROM issue_tags it
                          WHERE it.issue_id = issues.id AND it.tag_id = ?)",
        );
        params.push(Box::new(tag.id.clone()));
    } else {
        sql.push_str(" AND modification_date > ?");
        params.push(Box::new(spec.filter.min_modification_date));
    }

    // instr keeps '%' and '_' in user text literal, unlike LIKE
    let trimmed = spec.search_text.trim();
    if !trimmed.is_empty() {
        sql.push_str(" AND (instr(lower(title), lower(?)) > 0 OR instr(lower(content), lower(?)) > 0)");
        params.push(Box::new(trimmed.to_string()));
        params.push(Box::new(trimmed.to_string()));
    }

    for token in &spec.tokens {
        sql.push_str(
            " AND EXISTS (SELECT 1 FROM issue_tags it
                          WHERE it.issue_id = issues.id AND it.tag_id = ?)",
        );
        params.push(Box::new(token.clone()));
    }

    if spec.filter_enabled {
        if let Some(priority) = spec.priority {
            sql.push_str(" AND priority = ?");
            params.push(Box::new(priority.as_i64()));
        }
        match spec.status {
            StatusFilter::All => {}
            StatusFilter::Open => sql.push_str(" AND completed = 0"),
            StatusFilter::Closed => sql.push_str(" AND completed = 1"),
        }
    }

    let direction = if spec.newest_first { "DESC" } else { "ASC" };
    sql.push_str(&format!(" ORDER BY {} {direction}", spec.sort.column()));

    let mut stmt = store.conn().prepare(&sql)?;
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|b| b.as_ref()).collect();

    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        Ok(Issue {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            task_address: row.get(3)?,
            priority: Priority::from_i64(row.get(4)?),
            completed: row.get(5)?,
            creation_date: row.get(6)?,
            start_date: row.get(7)?,
            due_date: row.get(8)?,
            modification_date: row.get(9)?,
        })
    })?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Tag suggestions for the search field.
///
/// Active only while the text begins with `#`: the marker and
/// surrounding whitespace are stripped, an empty remainder returns
/// every tag sorted by name, and anything else substring-matches tag
/// names case-insensitively. Text without the marker suggests nothing.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn suggested_tags(store: &Store, text: &str) -> Result<Vec<Tag>> {
    let Some(remainder) = text.strip_prefix('#') else {
        return Ok(Vec::new());
    };

    let needle = remainder.trim();
    if needle.is_empty() {
        return store.all_tags();
    }

    let mut stmt = store.conn().prepare(
        "SELECT id, name FROM tags
         WHERE instr(lower(name), lower(?1)) > 0
         ORDER BY name, id",
    )?;

    let rows = stmt.query_map([needle], |row| {
        Ok(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Tags not yet linked to the given issue, sorted by name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn missing_tags(store: &Store, issue_id: &str) -> Result<Vec<Tag>> {
    let mut stmt = store.conn().prepare(
        "SELECT id, name FROM tags
         WHERE id NOT IN (SELECT tag_id FROM issue_tags WHERE issue_id = ?1)
         ORDER BY name, id",
    )?;

    let rows = stmt.query_map([issue_id], |row| {
        Ok(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> Store {
        let mut store = Store::open_memory().unwrap();
        store.create_sample_data().unwrap();
        store
    }

    #[test]
    fn test_default_spec_returns_everything() {
        let store = sample_store();
        let issues = resolve(&store, &FilterSpec::default()).unwrap();
        assert_eq!(issues.len(), 50);
    }

    #[test]
    fn test_search_matches_title_or_content_substring() {
        let store = sample_store();

        let spec = FilterSpec {
            search_text: "Issue 2-1".to_string(),
            ..FilterSpec::default()
        };
        let issues = resolve(&store, &spec).unwrap();

        // "Issue 2-1" and "Issue 2-10" both contain the substring
        let mut titles: Vec<&str> = issues.iter().map(|i| i.title.as_str()).collect();
        titles.sort_unstable();
        assert_eq!(titles, vec!["Issue 2-1", "Issue 2-10"]);

        // Content-side match, case-insensitively
        let spec = FilterSpec {
            search_text: "DESCRIPTION GOES HERE 3-7".to_string(),
            ..FilterSpec::default()
        };
        let issues = resolve(&store, &spec).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].title, "Issue 3-7");
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let store = sample_store();
        let spec = FilterSpec {
            search_text: "   ".to_string(),
            ..FilterSpec::default()
        };
        assert_eq!(resolve(&store, &spec).unwrap().len(), 50);
    }

    #[test]
    fn test_tag_scope_limits_to_membership() {
        let store = sample_store();
        let tag = store.all_tags().unwrap().into_iter().next().unwrap();

        let spec = FilterSpec {
            filter: Filter::for_tag(tag),
            ..FilterSpec::default()
        };
        assert_eq!(resolve(&store, &spec).unwrap().len(), 10);
    }

    #[test]
    fn test_recency_scope_excludes_stale_issues() {
        let mut store = sample_store();
        let cutoff = chrono::Utc::now().timestamp_millis() - 3_600_000;

        // Age one issue past the threshold
        let issue = store.all_issues().unwrap().into_iter().next().unwrap();
        store
            .mutate("age_issue", |tx, _ctx| {
                tx.execute(
                    "UPDATE issues SET modification_date = ?1 WHERE id = ?2",
                    rusqlite::params![cutoff - 1_000, issue.id],
                )?;
                Ok(())
            })
            .unwrap();

        let mut filter = Filter::recent();
        filter.min_modification_date = cutoff;
        let spec = FilterSpec {
            filter,
            ..FilterSpec::default()
        };
        assert_eq!(resolve(&store, &spec).unwrap().len(), 49);
    }

    #[test]
    fn test_tokens_are_a_conjunction() {
        let mut store = Store::open_memory().unwrap();
        let both = store.new_issue().unwrap();
        let only_a = store.new_issue().unwrap();
        let tag_a = store.new_tag().unwrap();
        let tag_b = store.new_tag().unwrap();

        store.link_tag(&both.id, &tag_a.id).unwrap();
        store.link_tag(&both.id, &tag_b.id).unwrap();
        store.link_tag(&only_a.id, &tag_a.id).unwrap();

        let spec = FilterSpec {
            tokens: vec![tag_a.id.clone(), tag_b.id.clone()],
            ..FilterSpec::default()
        };
        let issues = resolve(&store, &spec).unwrap();

        assert_eq!(issues.len(), 1, "only the issue linked to ALL tokens matches");
        assert_eq!(issues[0].id, both.id);
    }

    #[test]
    fn test_advanced_fields_ignored_when_disabled() {
        let store = sample_store();

        let spec = FilterSpec {
            filter_enabled: false,
            priority: Some(Priority::High),
            status: StatusFilter::Closed,
            ..FilterSpec::default()
        };
        assert_eq!(
            resolve(&store, &spec).unwrap().len(),
            50,
            "priority/status must not constrain while advanced filtering is off"
        );
    }

    #[test]
    fn test_status_filter_when_enabled() {
        let store = sample_store();

        let open = FilterSpec {
            filter_enabled: true,
            status: StatusFilter::Open,
            ..FilterSpec::default()
        };
        let closed = FilterSpec {
            filter_enabled: true,
            status: StatusFilter::Closed,
            ..FilterSpec::default()
        };

        assert_eq!(resolve(&store, &open).unwrap().len(), 25);
        assert_eq!(resolve(&store, &closed).unwrap().len(), 25);
    }

    #[test]
    fn test_priority_filter_when_enabled() {
        let store = sample_store();

        let spec = FilterSpec {
            filter_enabled: true,
            priority: Some(Priority::Low),
            ..FilterSpec::default()
        };
        // j in {3, 6, 9} per tag
        assert_eq!(resolve(&store, &spec).unwrap().len(), 15);

        let any = FilterSpec {
            filter_enabled: true,
            priority: None,
            ..FilterSpec::default()
        };
        assert_eq!(resolve(&store, &any).unwrap().len(), 50);
    }

    #[test]
    fn test_sort_direction_and_field() {
        let store = sample_store();

        let newest = resolve(&store, &FilterSpec::default()).unwrap();
        assert!(newest.windows(2).all(|w| w[0].creation_date >= w[1].creation_date));

        let oldest = FilterSpec {
            newest_first: false,
            ..FilterSpec::default()
        };
        let issues = resolve(&store, &oldest).unwrap();
        assert!(issues.windows(2).all(|w| w[0].creation_date <= w[1].creation_date));

        let by_modification = FilterSpec {
            sort: SortField::ModificationDate,
            ..FilterSpec::default()
        };
        let issues = resolve(&store, &by_modification).unwrap();
        assert!(
            issues
                .windows(2)
                .all(|w| w[0].modification_date >= w[1].modification_date)
        );
    }

    #[test]
    fn test_suggestions_require_marker() {
        let store = sample_store();
        assert!(suggested_tags(&store, "Tag").unwrap().is_empty());
        assert!(suggested_tags(&store, "").unwrap().is_empty());
    }

    #[test]
    fn test_bare_marker_suggests_all_tags_by_name() {
        let store = sample_store();

        let tags = suggested_tags(&store, "#").unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Tag 1", "Tag 2", "Tag 3", "Tag 4", "Tag 5"]);

        // Whitespace-only remainder behaves the same
        assert_eq!(suggested_tags(&store, "#  ").unwrap().len(), 5);
    }

    #[test]
    fn test_suggestions_match_substring_case_insensitively() {
        let store = sample_store();

        let tags = suggested_tags(&store, "#ag 2").unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "Tag 2");

        assert_eq!(suggested_tags(&store, "#TAG").unwrap().len(), 5);
        assert!(suggested_tags(&store, "#nothing").unwrap().is_empty());
    }

    #[test]
    fn test_missing_tags_complement() {
        let mut store = sample_store();
        let issue = store.new_issue().unwrap();
        let tag = store.all_tags().unwrap().into_iter().next().unwrap();

        assert_eq!(missing_tags(&store, &issue.id).unwrap().len(), 5);

        store.link_tag(&issue.id, &tag.id).unwrap();
        let missing = missing_tags(&store, &issue.id).unwrap();
        assert_eq!(missing.len(), 4);
        assert!(missing.iter().all(|t| t.id != tag.id));
    }

    #[test]
    fn test_groups_compose_as_one_conjunction() {
        let mut store = sample_store();
        let tag = store.all_tags().unwrap().into_iter().next().unwrap();

        // Close every issue in Tag 1 whose j is even; search narrows further
        let spec = FilterSpec {
            filter: Filter::for_tag(tag.clone()),
            search_text: "issue 1-".to_string(),
            tokens: vec![tag.id.clone()],
            filter_enabled: true,
            status: StatusFilter::Closed,
            ..FilterSpec::default()
        };
        let issues = resolve(&store, &spec).unwrap();

        assert_eq!(issues.len(), 5);
        assert!(issues.iter().all(|i| i.completed));
        assert!(issues.iter().all(|i| i.title.starts_with("Issue 1-")));

        // Unlinking from the scoped tag removes an issue from the result
        store.unlink_tag(&issues[0].id, &tag.id).unwrap();
        assert_eq!(resolve(&store, &spec).unwrap().len(), 4);
    }
}
