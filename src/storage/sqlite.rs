//! SQLite storage implementation.
//!
//! The main entity store. All mutations go through the `mutate`
//! closure protocol: one IMMEDIATE transaction at a time, audit events
//! written atomically with the data, rollback on error.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Row, Transaction};

use crate::error::{Error, Result};
use crate::model::{Issue, IssueEdit, Priority, Tag, TagEdit};
use crate::storage::events::{Event, EventType, insert_event};
use crate::storage::schema::apply_schema;

/// SQLite-based entity store.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

/// Context for a mutation operation, batching audit events.
///
/// Passed to mutation closures so events land in the same transaction
/// as the data they describe.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type));
    }

    /// Record an event with a detail string.
    pub fn record_detail(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        detail: &str,
    ) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type).with_detail(detail));
    }
}

/// Aggregate record counts, read in a single snapshot.
///
/// The award evaluator works off one of these rather than re-scanning
/// the store per award.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoreCounts {
    /// Total number of issues.
    pub issues: i64,
    /// Number of issues with `completed = true`.
    pub closed_issues: i64,
    /// Total number of tags.
    pub tags: i64,
}

/// One staged mutation, applied at commit time.
///
/// The save coordinator accumulates these between commits; the store
/// applies a batch of them in a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedEdit {
    /// A field edit on an issue.
    Issue { id: String, edit: IssueEdit },
    /// A field edit on a tag.
    Tag { id: String, edit: TagEdit },
    /// Link a tag to an issue (idempotent).
    Link { issue_id: String, tag_id: String },
    /// Unlink a tag from an issue.
    Unlink { issue_id: String, tag_id: String },
}

impl Store {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies the schema if needed. This is
    /// the one fatal failure point: no feature can work without the
    /// store, so callers should abort startup on `Err`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema fails to apply.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, Duration::from_secs(5))
    }

    /// Open a database with an explicit busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema fails to apply.
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing and previews).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// Begins an IMMEDIATE transaction (taking the write lock up
    /// front, so commits serialize), runs the closure, writes the
    /// batched audit events, then commits. Rolls back on error -
    /// a failed commit never applies partial mutations.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op);
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        tracing::debug!(op, events = ctx.events.len(), "mutation committed");

        Ok(result)
    }

    // ================
    // Issue Operations
    // ================

    /// Create a new issue with default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn new_issue(&mut self) -> Result<Issue> {
        let issue = Issue::new();

        self.mutate("new_issue", |tx, ctx| {
            tx.execute(
                "INSERT INTO issues (id, title, content, task_address, priority, completed,
                                     creation_date, start_date, due_date, modification_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    issue.id,
                    issue.title,
                    issue.content,
                    issue.task_address,
                    issue.priority.as_i64(),
                    issue.completed,
                    issue.creation_date,
                    issue.start_date,
                    issue.due_date,
                    issue.modification_date,
                ],
            )?;

            ctx.record_event("issue", &issue.id, EventType::IssueCreated);
            Ok(())
        })?;

        Ok(issue)
    }

    /// Get an issue by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn issue(&self, id: &str) -> Result<Option<Issue>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, content, task_address, priority, completed,
                    creation_date, start_date, due_date, modification_date
             FROM issues WHERE id = ?1",
        )?;

        let issue = stmt.query_row([id], map_issue_row).optional()?;
        Ok(issue)
    }

    /// All live issues, in creation order (newest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn all_issues(&self) -> Result<Vec<Issue>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, content, task_address, priority, completed,
                    creation_date, start_date, due_date, modification_date
             FROM issues ORDER BY creation_date DESC",
        )?;

        let rows = stmt.query_map([], map_issue_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Delete an issue, clearing its tag memberships. The tags
    /// themselves are never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IssueNotFound`] if no such issue exists, or an
    /// error if the delete fails.
    pub fn delete_issue(&mut self, id: &str) -> Result<()> {
        self.mutate("delete_issue", |tx, ctx| {
            tx.execute("DELETE FROM issue_tags WHERE issue_id = ?1", [id])?;
            let rows = tx.execute("DELETE FROM issues WHERE id = ?1", [id])?;

            if rows == 0 {
                return Err(Error::IssueNotFound { id: id.to_string() });
            }

            ctx.record_event("issue", id, EventType::IssueDeleted);
            Ok(())
        })
    }

    // ==============
    // Tag Operations
    // ==============

    /// Create a new tag with default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn new_tag(&mut self) -> Result<Tag> {
        let tag = Tag::new();

        self.mutate("new_tag", |tx, ctx| {
            tx.execute(
                "INSERT INTO tags (id, name) VALUES (?1, ?2)",
                rusqlite::params![tag.id, tag.name],
            )?;

            ctx.record_event("tag", &tag.id, EventType::TagCreated);
            Ok(())
        })?;

        Ok(tag)
    }

    /// Get a tag by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn tag(&self, id: &str) -> Result<Option<Tag>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM tags WHERE id = ?1")?;
        let tag = stmt.query_row([id], map_tag_row).optional()?;
        Ok(tag)
    }

    /// All tags, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn all_tags(&self) -> Result<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM tags ORDER BY name, id")?;

        let rows = stmt.query_map([], map_tag_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Delete a tag, removing it from every issue's tag set. The
    /// issues themselves are never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagNotFound`] if no such tag exists, or an
    /// error if the delete fails.
    pub fn delete_tag(&mut self, id: &str) -> Result<()> {
        self.mutate("delete_tag", |tx, ctx| {
            tx.execute("DELETE FROM issue_tags WHERE tag_id = ?1", [id])?;
            let rows = tx.execute("DELETE FROM tags WHERE id = ?1", [id])?;

            if rows == 0 {
                return Err(Error::TagNotFound { id: id.to_string() });
            }

            ctx.record_event("tag", id, EventType::TagDeleted);
            Ok(())
        })
    }

    // =====================
    // Membership Operations
    // =====================

    /// Tags linked to an issue, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn tags_for_issue(&self, issue_id: &str) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name FROM tags t
             JOIN issue_tags it ON it.tag_id = t.id
             WHERE it.issue_id = ?1
             ORDER BY t.name, t.id",
        )?;

        let rows = stmt.query_map([issue_id], map_tag_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Link a tag to an issue. Linking twice is a no-op; the
    /// membership set never holds duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn link_tag(&mut self, issue_id: &str, tag_id: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("link_tag", |tx, ctx| {
            let rows = tx.execute(
                "INSERT OR IGNORE INTO issue_tags (issue_id, tag_id) VALUES (?1, ?2)",
                rusqlite::params![issue_id, tag_id],
            )?;

            if rows > 0 {
                bump_modification_date(tx, issue_id, now)?;
                ctx.record_detail("issue", issue_id, EventType::IssueTagged, tag_id);
            }
            Ok(())
        })
    }

    /// Unlink a tag from an issue. Unlinking an absent membership is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn unlink_tag(&mut self, issue_id: &str, tag_id: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("unlink_tag", |tx, ctx| {
            let rows = tx.execute(
                "DELETE FROM issue_tags WHERE issue_id = ?1 AND tag_id = ?2",
                rusqlite::params![issue_id, tag_id],
            )?;

            if rows > 0 {
                bump_modification_date(tx, issue_id, now)?;
                ctx.record_detail("issue", issue_id, EventType::IssueUntagged, tag_id);
            }
            Ok(())
        })
    }

    // =============
    // Batch Commits
    // =============

    /// Apply a batch of staged edits in one transaction.
    ///
    /// Edits are applied in order, so the last staged value for a
    /// field wins. Every touched issue gets its modification date
    /// bumped exactly once, and never backwards. Edits naming a
    /// missing record are skipped: the record was deleted since the
    /// edit was staged, and partial state is tolerable by design.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; no edits apply in
    /// that case.
    pub fn apply_edits(&mut self, edits: &[StagedEdit]) -> Result<()> {
        if edits.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("apply_edits", |tx, ctx| {
            let mut touched: BTreeSet<&str> = BTreeSet::new();

            for staged in edits {
                match staged {
                    StagedEdit::Issue { id, edit } => {
                        if apply_issue_edit(tx, id, edit)? {
                            touched.insert(id);
                            record_issue_edit(ctx, id, edit);
                        }
                    }
                    StagedEdit::Tag {
                        id,
                        edit: TagEdit::Name(name),
                    } => {
                        let rows = tx.execute(
                            "UPDATE tags SET name = ?1 WHERE id = ?2",
                            rusqlite::params![name, id],
                        )?;
                        if rows > 0 {
                            ctx.record_detail("tag", id, EventType::TagRenamed, name);
                        }
                    }
                    StagedEdit::Link { issue_id, tag_id } => {
                        let rows = tx.execute(
                            "INSERT OR IGNORE INTO issue_tags (issue_id, tag_id) VALUES (?1, ?2)",
                            rusqlite::params![issue_id, tag_id],
                        )?;
                        if rows > 0 {
                            touched.insert(issue_id);
                            ctx.record_detail("issue", issue_id, EventType::IssueTagged, tag_id);
                        }
                    }
                    StagedEdit::Unlink { issue_id, tag_id } => {
                        let rows = tx.execute(
                            "DELETE FROM issue_tags WHERE issue_id = ?1 AND tag_id = ?2",
                            rusqlite::params![issue_id, tag_id],
                        )?;
                        if rows > 0 {
                            touched.insert(issue_id);
                            ctx.record_detail("issue", issue_id, EventType::IssueUntagged, tag_id);
                        }
                    }
                }
            }

            for id in touched {
                bump_modification_date(tx, id, now)?;
            }

            Ok(())
        })
    }

    // ==========
    // Aggregates
    // ==========

    /// Total number of issues.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_issues(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Number of completed issues.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_closed_issues(&self) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM issues WHERE completed = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Total number of tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_tags(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All aggregate counts in one snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if any count query fails.
    pub fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            issues: self.count_issues()?,
            closed_issues: self.count_closed_issues()?,
            tags: self.count_tags()?,
        })
    }

    // ===========
    // Maintenance
    // ===========

    /// Delete every issue, tag, and membership. The audit log is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn delete_all(&mut self) -> Result<()> {
        self.mutate("delete_all", |tx, ctx| {
            tx.execute("DELETE FROM issue_tags", [])?;
            tx.execute("DELETE FROM issues", [])?;
            tx.execute("DELETE FROM tags", [])?;

            ctx.record_event("store", "all", EventType::StoreCleared);
            Ok(())
        })
    }

    /// Populate the store with the deterministic sample fixture:
    /// 5 tags with 10 issues each. Issue `i-j` is completed when `j`
    /// is even, and its priority cycles with `j`. Creation dates
    /// descend with `i` and `j`, so ordering is stable across runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn create_sample_data(&mut self) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("create_sample_data", |tx, ctx| {
            for i in 1..=5_i64 {
                let tag = Tag {
                    id: format!("tag_sample{i:07}"),
                    name: format!("Tag {i}"),
                };
                tx.execute(
                    "INSERT INTO tags (id, name) VALUES (?1, ?2)",
                    rusqlite::params![tag.id, tag.name],
                )?;
                ctx.record_event("tag", &tag.id, EventType::TagCreated);

                for j in 1..=10_i64 {
                    let stamp = now - (i * 10 + j) * 1_000;
                    let issue = Issue {
                        id: format!("issue_sample{i}{j:03}"),
                        title: format!("Issue {i}-{j}"),
                        content: format!("Description goes here {i}-{j}"),
                        task_address: String::new(),
                        priority: Priority::from_i64(j % 3),
                        completed: j % 2 == 0,
                        creation_date: stamp,
                        start_date: None,
                        due_date: None,
                        modification_date: stamp,
                    };

                    tx.execute(
                        "INSERT INTO issues (id, title, content, task_address, priority, completed,
                                             creation_date, start_date, due_date, modification_date)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                        rusqlite::params![
                            issue.id,
                            issue.title,
                            issue.content,
                            issue.task_address,
                            issue.priority.as_i64(),
                            issue.completed,
                            issue.creation_date,
                            issue.start_date,
                            issue.due_date,
                            issue.modification_date,
                        ],
                    )?;
                    tx.execute(
                        "INSERT INTO issue_tags (issue_id, tag_id) VALUES (?1, ?2)",
                        rusqlite::params![issue.id, tag.id],
                    )?;
                    ctx.record_event("issue", &issue.id, EventType::IssueCreated);
                }
            }
            Ok(())
        })
    }
}

fn map_issue_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
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
}

fn map_tag_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

/// Set an issue's modification date forward, never backwards.
fn bump_modification_date(tx: &Transaction, issue_id: &str, now: i64) -> Result<()> {
    tx.execute(
        "UPDATE issues SET modification_date = MAX(modification_date, ?1) WHERE id = ?2",
        rusqlite::params![now, issue_id],
    )?;
    Ok(())
}

/// Apply a single field edit. Returns whether a row was updated.
fn apply_issue_edit(tx: &Transaction, id: &str, edit: &IssueEdit) -> Result<bool> {
    let rows = match edit {
        IssueEdit::Title(value) => tx.execute(
            "UPDATE issues SET title = ?1 WHERE id = ?2",
            rusqlite::params![value, id],
        )?,
        IssueEdit::Content(value) => tx.execute(
            "UPDATE issues SET content = ?1 WHERE id = ?2",
            rusqlite::params![value, id],
        )?,
        IssueEdit::TaskAddress(value) => tx.execute(
            "UPDATE issues SET task_address = ?1 WHERE id = ?2",
            rusqlite::params![value, id],
        )?,
        IssueEdit::Priority(value) => tx.execute(
            "UPDATE issues SET priority = ?1 WHERE id = ?2",
            rusqlite::params![value.as_i64(), id],
        )?,
        IssueEdit::Completed(value) => tx.execute(
            "UPDATE issues SET completed = ?1 WHERE id = ?2",
            rusqlite::params![value, id],
        )?,
        IssueEdit::StartDate(value) => tx.execute(
            "UPDATE issues SET start_date = ?1 WHERE id = ?2",
            rusqlite::params![value, id],
        )?,
        IssueEdit::DueDate(value) => tx.execute(
            "UPDATE issues SET due_date = ?1 WHERE id = ?2",
            rusqlite::params![value, id],
        )?,
    };
    Ok(rows > 0)
}

fn record_issue_edit(ctx: &mut MutationContext, id: &str, edit: &IssueEdit) {
    match edit {
        IssueEdit::Completed(true) => ctx.record_event("issue", id, EventType::IssueClosed),
        IssueEdit::Completed(false) => ctx.record_event("issue", id, EventType::IssueReopened),
        _ => ctx.record_detail("issue", id, EventType::IssueEdited, edit.field()),
    }
}
