//! Audit event storage and retrieval.
//!
//! Events track all mutations in the database for debugging and
//! history.

use rusqlite::{Connection, Result};

/// Event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    // Issue events
    IssueCreated,
    IssueEdited,
    IssueClosed,
    IssueReopened,
    IssueDeleted,

    // Tag events
    TagCreated,
    TagRenamed,
    TagDeleted,

    // Membership events
    IssueTagged,
    IssueUntagged,

    // Store events
    StoreCleared,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IssueCreated => "issue_created",
            Self::IssueEdited => "issue_edited",
            Self::IssueClosed => "issue_closed",
            Self::IssueReopened => "issue_reopened",
            Self::IssueDeleted => "issue_deleted",
            Self::TagCreated => "tag_created",
            Self::TagRenamed => "tag_renamed",
            Self::TagDeleted => "tag_deleted",
            Self::IssueTagged => "issue_tagged",
            Self::IssueUntagged => "issue_untagged",
            Self::StoreCleared => "store_cleared",
        }
    }
}

/// An audit event record.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: EventType,
    pub detail: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by the database).
    #[must_use]
    pub fn new(entity_type: &str, entity_id: &str, event_type: EventType) -> Self {
        Self {
            id: 0,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            event_type,
            detail: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Attach a human-readable detail string (field name, new value).
    #[must_use]
    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (entity_type, entity_id, event_type, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            event.entity_type,
            event.entity_id,
            event.event_type.as_str(),
            event.detail,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get events for an entity, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn events_for(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    limit: Option<u32>,
) -> Result<Vec<Event>> {
    let limit = limit.unwrap_or(100);
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, entity_id, event_type, detail, created_at
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY created_at DESC, id DESC
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(rusqlite::params![entity_type, entity_id, limit], |row| {
        Ok(Event {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            event_type: parse_event_type(row.get::<_, String>(3)?.as_str()),
            detail: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;

    rows.collect()
}

fn parse_event_type(s: &str) -> EventType {
    match s {
        "issue_created" => EventType::IssueCreated,
        "issue_closed" => EventType::IssueClosed,
        "issue_reopened" => EventType::IssueReopened,
        "issue_deleted" => EventType::IssueDeleted,
        "tag_created" => EventType::TagCreated,
        "tag_renamed" => EventType::TagRenamed,
        "tag_deleted" => EventType::TagDeleted,
        "issue_tagged" => EventType::IssueTagged,
        "issue_untagged" => EventType::IssueUntagged,
        "store_cleared" => EventType::StoreCleared,
        _ => EventType::IssueEdited, // Fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_schema;

    #[test]
    fn test_event_insert_and_get() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let event = Event::new("issue", "issue_123", EventType::IssueCreated)
            .with_detail("title: New issue");

        let id = insert_event(&conn, &event).unwrap();
        assert!(id > 0);

        let events = events_for(&conn, "issue", "issue_123", Some(10)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::IssueCreated);
        assert_eq!(events[0].detail, Some("title: New issue".to_string()));
    }

    #[test]
    fn test_events_are_scoped_to_entity() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        insert_event(&conn, &Event::new("issue", "a", EventType::IssueCreated)).unwrap();
        insert_event(&conn, &Event::new("tag", "a", EventType::TagCreated)).unwrap();

        let events = events_for(&conn, "issue", "a", None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].entity_type, "issue");
    }
}
