//! Award catalog and evaluator.
//!
//! The catalog is static configuration: a fixed JSON resource embedded
//! at build time and parsed once. Evaluation is a pure function of an
//! aggregate-count snapshot, so checking the whole catalog costs one
//! set of O(store) counts, not a re-scan per award.

use std::sync::LazyLock;

use crate::model::{Award, Criterion};
use crate::storage::StoreCounts;

static CATALOG: LazyLock<Vec<Award>> = LazyLock::new(|| {
    serde_json::from_str(include_str!("../../assets/awards.json"))
        .expect("embedded award catalog is valid JSON")
});

/// The full award catalog, loaded once.
#[must_use]
pub fn all() -> &'static [Award] {
    CATALOG.as_slice()
}

/// Whether an award is earned given a counts snapshot.
///
/// Criteria compare an aggregate against the award's threshold;
/// unrecognized criteria are never earned: the catalog is external
/// and may know rules this build does not.
#[must_use]
pub fn has_earned(award: &Award, counts: &StoreCounts) -> bool {
    match award.criterion {
        Criterion::Issues => counts.issues >= award.value,
        Criterion::Closed => counts.closed_issues >= award.value,
        Criterion::Tags => counts.tags >= award.value,
        Criterion::Unknown => false,
    }
}
