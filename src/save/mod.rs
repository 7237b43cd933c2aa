//! Save coordinator.
//!
//! The write path and the facade UI collaborators talk to. Edits are
//! staged field-by-field in a pending buffer and committed in one
//! transaction: either when the debounce timer expires (a fixed delay
//! after the *last* triggering edit) or when an explicit, synchronous
//! [`Coordinator::save`] runs. The timer is an owned, replaceable
//! resource: arming a new one always aborts the previous handle, so
//! two pending timers can never both fire.
//!
//! Remote-change signals from the external sync source only publish an
//! invalidation: they never touch the pending buffer, so staged local
//! edits survive and win per-field at the next commit.
//!
//! # Submodules
//!
//! - [`pending`] - The pending edit buffer

pub mod pending;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::awards;
use crate::error::Result;
use crate::model::{Award, Issue, IssueEdit, Tag, TagEdit};
use crate::notify::{ChangeEvent, ChangeNotifier};
use crate::query::{self, FilterSpec};
use crate::save::pending::PendingEdits;
use crate::storage::{StagedEdit, Store, StoreCounts};

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Quiet period after the last edit before an automatic commit.
    pub debounce: Duration,
    /// SQLite busy timeout for the underlying store.
    pub busy_timeout: Duration,
    /// Per-subscriber buffer size for the change notifier.
    pub notifier_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(3),
            busy_timeout: Duration::from_secs(5),
            notifier_capacity: 64,
        }
    }
}

struct Inner {
    store: Mutex<Store>,
    pending: Mutex<PendingEdits>,
    timer: Mutex<Option<JoinHandle<()>>>,
    notifier: ChangeNotifier,
    debounce: Duration,
}

impl Inner {
    /// Abort and release the pending timer, if any.
    fn cancel_timer(&self) {
        if let Some(handle) = self.timer.lock().expect("timer lock").take() {
            handle.abort();
        }
    }

    /// Commit the pending buffer if it is non-empty.
    ///
    /// Idempotent: with nothing staged this is a no-op, so a racing
    /// timer and explicit save cannot double-commit. On failure the
    /// batch goes back in the buffer for a silent retry on the next
    /// trigger: local edits are never discarded.
    fn commit_pending(&self) {
        let batch = {
            let mut pending = self.pending.lock().expect("pending edits lock");
            if pending.is_empty() {
                return;
            }
            pending.take()
        };

        let result = {
            let mut store = self.store.lock().expect("store lock");
            store.apply_edits(&batch)
        };

        match result {
            Ok(()) => self.notifier.publish(ChangeEvent::Local),
            Err(error) => {
                tracing::warn!(%error, edits = batch.len(), "commit failed, edits kept for retry");
                self.pending
                    .lock()
                    .expect("pending edits lock")
                    .restore(batch);
            }
        }
    }
}

/// The query & synchronization coordinator.
///
/// Owns the entity store, the pending edit buffer, the debounce timer,
/// and the change notifier. Cheap to clone; all clones share state.
///
/// Reads degrade rather than fail: a store error resolves to an empty
/// result (or zero counts) with a warning, so the caller stays usable
/// through transient sync outages.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Open a coordinator over a database at the given path.
    ///
    /// This is the one fatal failure point: abort startup on `Err`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Open with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn open_with_config(path: &Path, config: Config) -> Result<Self> {
        let store = Store::open_with_timeout(path, config.busy_timeout)?;
        Ok(Self::from_store(store, &config))
    }

    /// Open a coordinator over an in-memory store (tests, previews).
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn open_memory() -> Result<Self> {
        Self::open_memory_with_config(Config::default())
    }

    /// In-memory store with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn open_memory_with_config(config: Config) -> Result<Self> {
        let store = Store::open_memory()?;
        Ok(Self::from_store(store, &config))
    }

    fn from_store(store: Store, config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(store),
                pending: Mutex::new(PendingEdits::default()),
                timer: Mutex::new(None),
                notifier: ChangeNotifier::new(config.notifier_capacity),
                debounce: config.debounce,
            }),
        }
    }

    // =============
    // Notifications
    // =============

    /// Subscribe to change events for invalidation.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
        self.inner.notifier.subscribe()
    }

    /// Handle a remote-mutation signal from the external change
    /// source: invalidate readers without touching staged local edits,
    /// which win per-field at the next commit.
    pub fn remote_changed(&self) {
        tracing::debug!("remote change signalled");
        self.inner.notifier.publish(ChangeEvent::Remote);
    }

    /// Attach an external change source.
    ///
    /// Spawns a forwarder that treats every unit received as a remote
    /// mutation, until the sender side closes. The signal carries no
    /// per-field payload; readers re-query on receipt.
    pub fn attach_remote_source(
        &self,
        mut source: tokio::sync::mpsc::Receiver<()>,
    ) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            while source.recv().await.is_some() {
                coordinator.remote_changed();
            }
            tracing::debug!("remote change source closed");
        })
    }

    // ==========
    // Write Path
    // ==========

    /// Create a new issue immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn new_issue(&self) -> Result<Issue> {
        let issue = self.inner.store.lock().expect("store lock").new_issue()?;
        self.inner.notifier.publish(ChangeEvent::Local);
        Ok(issue)
    }

    /// Create a new tag immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn new_tag(&self) -> Result<Tag> {
        let tag = self.inner.store.lock().expect("store lock").new_tag()?;
        self.inner.notifier.publish(ChangeEvent::Local);
        Ok(tag)
    }

    /// Stage a field edit on an issue and arm the debounce timer.
    pub fn edit_issue(&self, id: &str, edit: IssueEdit) {
        self.stage(StagedEdit::Issue {
            id: id.to_string(),
            edit,
        });
    }

    /// Stage a field edit on a tag and arm the debounce timer.
    pub fn edit_tag(&self, id: &str, edit: TagEdit) {
        self.stage(StagedEdit::Tag {
            id: id.to_string(),
            edit,
        });
    }

    /// Stage linking a tag to an issue and arm the debounce timer.
    pub fn tag_issue(&self, issue_id: &str, tag_id: &str) {
        self.stage(StagedEdit::Link {
            issue_id: issue_id.to_string(),
            tag_id: tag_id.to_string(),
        });
    }

    /// Stage unlinking a tag from an issue and arm the debounce timer.
    pub fn untag_issue(&self, issue_id: &str, tag_id: &str) {
        self.stage(StagedEdit::Unlink {
            issue_id: issue_id.to_string(),
            tag_id: tag_id.to_string(),
        });
    }

    fn stage(&self, edit: StagedEdit) {
        self.inner
            .pending
            .lock()
            .expect("pending edits lock")
            .stage(edit);
        self.queue_save();
    }

    /// Arm (or re-arm) the debounce timer.
    ///
    /// The previous timer, if any, is aborted before the new one is
    /// spawned; commits themselves contain no await point, so an
    /// aborted task either dies sleeping or has already finished its
    /// commit. Must be called from within a tokio runtime.
    pub fn queue_save(&self) {
        let mut slot = self.inner.timer.lock().expect("timer lock");
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let inner = Arc::clone(&self.inner);
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            inner.commit_pending();
        }));
    }

    /// Commit staged edits now, cancelling any pending timer.
    ///
    /// Synchronous and idempotent; used before destructive operations
    /// and at process-suspend boundaries. A failed commit is logged
    /// and silently retried on the next trigger.
    pub fn save(&self) {
        self.inner.cancel_timer();
        self.inner.commit_pending();
    }

    /// Whether any edits are staged but not yet committed.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self
            .inner
            .pending
            .lock()
            .expect("pending edits lock")
            .is_empty()
    }

    /// Delete an issue, flushing staged edits first.
    ///
    /// # Errors
    ///
    /// Returns an error if the issue does not exist or the delete
    /// fails.
    pub fn delete_issue(&self, id: &str) -> Result<()> {
        self.save();
        self.inner
            .store
            .lock()
            .expect("store lock")
            .delete_issue(id)?;
        self.inner.notifier.publish(ChangeEvent::Local);
        Ok(())
    }

    /// Delete a tag, flushing staged edits first. Member issues are
    /// unlinked, never deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag does not exist or the delete fails.
    pub fn delete_tag(&self, id: &str) -> Result<()> {
        self.save();
        self.inner
            .store
            .lock()
            .expect("store lock")
            .delete_tag(id)?;
        self.inner.notifier.publish(ChangeEvent::Local);
        Ok(())
    }

    /// Delete every issue and tag. Staged edits are dropped: there is
    /// nothing left for them to apply to.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn delete_all(&self) -> Result<()> {
        self.inner.cancel_timer();
        self.inner
            .pending
            .lock()
            .expect("pending edits lock")
            .clear();
        self.inner.store.lock().expect("store lock").delete_all()?;
        self.inner.notifier.publish(ChangeEvent::Local);
        Ok(())
    }

    /// Populate the deterministic sample fixture (5 tags, 50 issues).
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn create_sample_data(&self) -> Result<()> {
        self.inner
            .store
            .lock()
            .expect("store lock")
            .create_sample_data()?;
        self.inner.notifier.publish(ChangeEvent::Local);
        Ok(())
    }

    // =========
    // Read Path
    // =========

    /// Resolve a filter spec to an ordered issue list.
    ///
    /// Degrades to an empty list on store failure.
    #[must_use]
    pub fn resolve(&self, spec: &FilterSpec) -> Vec<Issue> {
        let store = self.inner.store.lock().expect("store lock");
        query::resolve(&store, spec).unwrap_or_else(|error| {
            tracing::warn!(%error, "resolve degraded to empty result");
            Vec::new()
        })
    }

    /// Tag suggestions for the search field (see
    /// [`query::suggested_tags`]). Degrades to an empty list.
    #[must_use]
    pub fn suggested_tags(&self, text: &str) -> Vec<Tag> {
        let store = self.inner.store.lock().expect("store lock");
        query::suggested_tags(&store, text).unwrap_or_else(|error| {
            tracing::warn!(%error, "tag suggestion degraded to empty result");
            Vec::new()
        })
    }

    /// Tags not yet linked to an issue. Degrades to an empty list.
    #[must_use]
    pub fn missing_tags(&self, issue_id: &str) -> Vec<Tag> {
        let store = self.inner.store.lock().expect("store lock");
        query::missing_tags(&store, issue_id).unwrap_or_else(|error| {
            tracing::warn!(%error, "missing-tags read degraded to empty result");
            Vec::new()
        })
    }

    /// Point-read an issue. Degrades to `None`.
    #[must_use]
    pub fn issue(&self, id: &str) -> Option<Issue> {
        let store = self.inner.store.lock().expect("store lock");
        store.issue(id).unwrap_or_else(|error| {
            tracing::warn!(%error, "issue read degraded to none");
            None
        })
    }

    /// Tags linked to an issue, by name. Degrades to an empty list.
    #[must_use]
    pub fn tags_for_issue(&self, issue_id: &str) -> Vec<Tag> {
        let store = self.inner.store.lock().expect("store lock");
        store.tags_for_issue(issue_id).unwrap_or_else(|error| {
            tracing::warn!(%error, "tag membership read degraded to empty result");
            Vec::new()
        })
    }

    /// Aggregate counts snapshot. Degrades to zeros.
    #[must_use]
    pub fn counts(&self) -> StoreCounts {
        let store = self.inner.store.lock().expect("store lock");
        store.counts().unwrap_or_else(|error| {
            tracing::warn!(%error, "counts degraded to zero");
            StoreCounts::default()
        })
    }

    /// Whether an award is earned against the store's current state.
    ///
    /// Pure function of a fresh counts snapshot: no caching across
    /// calls. To evaluate a whole catalog, take [`Self::counts`] once
    /// and use [`awards::has_earned`] directly.
    #[must_use]
    pub fn has_earned(&self, award: &Award) -> bool {
        awards::has_earned(award, &self.counts())
    }
}
