//! issuedeck - personal issue-tracking data layer
//!
//! Issues grouped by tags, ad-hoc filtering and search, debounced
//! persistence reconciled with an external change stream, and awards
//! computed from aggregate statistics. Presentation concerns (forms,
//! lists, maps) sit above this crate and subscribe to the change
//! notifier for invalidation.
//!
//! # Architecture
//!
//! - [`model`] - Data types (Issue, Tag, Filter, Award)
//! - [`storage`] - SQLite entity store with audit events
//! - [`query`] - Filter engine (`FilterSpec` to ordered issues)
//! - [`save`] - Save coordinator (debounced writes, remote reconciliation)
//! - [`awards`] - Static award catalog and evaluator
//! - [`notify`] - Change notifier (broadcast invalidation)
//! - [`error`] - Error types and handling
//!
//! # Example
//!
//! ```
//! use issuedeck::model::IssueEdit;
//! use issuedeck::query::FilterSpec;
//! use issuedeck::save::Coordinator;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> issuedeck::Result<()> {
//! let deck = Coordinator::open_memory()?;
//!
//! let issue = deck.new_issue()?;
//! deck.edit_issue(&issue.id, IssueEdit::Title("Fix the roof".to_string()));
//! deck.save();
//!
//! let issues = deck.resolve(&FilterSpec::default());
//! assert_eq!(issues[0].title, "Fix the roof");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod awards;
pub mod error;
pub mod model;
pub mod notify;
pub mod query;
pub mod save;
pub mod storage;

pub use error::{Error, Result};
pub use model::{Award, Criterion, Filter, Issue, IssueEdit, Priority, Tag, TagEdit};
pub use notify::{ChangeEvent, ChangeNotifier};
pub use query::{FilterSpec, SortField, StatusFilter};
pub use save::{Config, Coordinator};
pub use storage::{Store, StoreCounts};
