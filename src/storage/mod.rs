//! SQLite storage layer for issuedeck.
//!
//! This module provides the entity store:
//! - WAL mode for concurrent reads
//! - IMMEDIATE transactions so one commit is in flight at a time
//! - Audit events written atomically with every mutation
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite store implementation

pub mod events;
pub mod schema;
pub mod sqlite;

pub use sqlite::{MutationContext, StagedEdit, Store, StoreCounts};
