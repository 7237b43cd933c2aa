//! Pending edit buffer.
//!
//! Field-level edits staged between commits. Order is preserved so the
//! last staged value for a field wins at apply time, and a failed
//! commit can put its batch back without reordering anything staged
//! since.

use crate::storage::StagedEdit;

/// Uncommitted edits, in staging order.
#[derive(Debug, Default)]
pub struct PendingEdits {
    edits: Vec<StagedEdit>,
}

impl PendingEdits {
    /// Stage one edit.
    pub fn stage(&mut self, edit: StagedEdit) {
        self.edits.push(edit);
    }

    /// Take the whole batch for committing, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<StagedEdit> {
        std::mem::take(&mut self.edits)
    }

    /// Put a failed batch back, ahead of anything staged since.
    pub fn restore(&mut self, mut batch: Vec<StagedEdit>) {
        batch.append(&mut self.edits);
        self.edits = batch;
    }

    /// Drop everything staged.
    pub fn clear(&mut self) {
        self.edits.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IssueEdit;

    fn title_edit(id: &str, title: &str) -> StagedEdit {
        StagedEdit::Issue {
            id: id.to_string(),
            edit: IssueEdit::Title(title.to_string()),
        }
    }

    #[test]
    fn test_take_empties_the_buffer() {
        let mut pending = PendingEdits::default();
        pending.stage(title_edit("a", "one"));
        pending.stage(title_edit("a", "two"));

        let batch = pending.take();
        assert_eq!(batch.len(), 2);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_restore_keeps_staging_order() {
        let mut pending = PendingEdits::default();
        pending.stage(title_edit("a", "one"));

        let batch = pending.take();
        pending.stage(title_edit("a", "two"));
        pending.restore(batch);

        let replayed = pending.take();
        assert_eq!(
            replayed,
            vec![title_edit("a", "one"), title_edit("a", "two")],
            "the failed batch must replay before later edits"
        );
    }
}
