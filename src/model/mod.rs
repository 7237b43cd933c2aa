//! Data models for issuedeck.
//!
//! This module contains all domain types:
//! - Issue (with Priority)
//! - Tag
//! - Filter (smart and tag-bound)
//! - Award (with Criterion)

pub mod award;
pub mod filter;
pub mod issue;
pub mod tag;

pub use award::{Award, Criterion};
pub use filter::Filter;
pub use issue::{Issue, IssueEdit, Priority};
pub use tag::{Tag, TagEdit};
