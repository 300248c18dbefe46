//! Task store adapters.
//!
//! Bridges the in-memory task collection to a persisted, subscribable
//! collection scoped per identity. Two adapters exist: `remote` wraps a
//! document backend (live subscription, full-snapshot re-emit), `local` is
//! the per-identity file fallback used when no remote backend is configured.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::session::Identity;
use crate::task::{Task, TaskDraft, TaskPatch};

pub mod local;
pub mod remote;

pub use local::LocalStore;
pub use remote::{MemoryBackend, RemoteStore};

/// The complete current set of one identity's tasks.
///
/// Re-emitted in full on every change; consumers always render the most
/// recent snapshot and discard stale ones ("last snapshot wins").
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub generated_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
}

impl TaskSnapshot {
    pub fn now(tasks: Vec<Task>) -> Self {
        Self {
            generated_at: Utc::now(),
            tasks,
        }
    }
}

/// Cancellation handle for a live subscription.
///
/// Cancelling is idempotent; after the first call no further snapshots are
/// produced. Dropping the handle cancels too.
pub struct SubscriptionHandle {
    pump: Option<tokio::task::JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn new(pump: tokio::task::JoinHandle<()>) -> Self {
        Self { pump: Some(pump) }
    }

    pub fn cancel(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.pump.is_none()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A live stream of full-collection snapshots plus its cancellation handle.
pub struct TaskFeed {
    snapshots: watch::Receiver<TaskSnapshot>,
    handle: SubscriptionHandle,
}

impl TaskFeed {
    pub fn new(snapshots: watch::Receiver<TaskSnapshot>, handle: SubscriptionHandle) -> Self {
        Self { snapshots, handle }
    }

    /// The most recently delivered snapshot.
    pub fn snapshot(&self) -> TaskSnapshot {
        self.snapshots.borrow().clone()
    }

    /// The most recent snapshot, marking it seen.
    pub fn latest(&mut self) -> TaskSnapshot {
        self.snapshots.borrow_and_update().clone()
    }

    /// Wait for the next snapshot.
    pub async fn changed(&mut self) -> Result<()> {
        self.snapshots
            .changed()
            .await
            .map_err(|_| Error::SubscriptionClosed)
    }

    /// Whether a snapshot newer than the last seen one has arrived.
    pub fn has_changed(&self) -> bool {
        self.snapshots.has_changed().unwrap_or(false)
    }

    pub fn cancel(&mut self) {
        self.handle.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }
}

/// Per-identity task persistence.
///
/// Mutations fire independently and return/fail on their own; conflicting
/// writes to the same task resolve to whichever lands last at the backend.
#[allow(async_fn_in_trait)]
pub trait TaskStore {
    /// Establish a live subscription filtered to the identity's tasks.
    async fn subscribe(&self, identity: &Identity) -> Result<TaskFeed>;

    /// Persist a new task owned by the identity.
    async fn create(&self, identity: &Identity, draft: TaskDraft) -> Result<Task>;

    /// Apply a typed partial merge to an existing task.
    ///
    /// A missing record is a reportable [`Error::TaskNotFound`].
    async fn update(&self, identity: &Identity, task_id: &str, patch: TaskPatch) -> Result<Task>;

    /// Remove a task. Deleting an id that is already gone succeeds.
    async fn delete(&self, identity: &Identity, task_id: &str) -> Result<()>;
}

/// Holds at most one live feed and guarantees teardown order on rebind.
///
/// The prior identity's subscription is cancelled before the new one is
/// established, so a snapshot from the old identity can never surface after
/// a switch.
#[derive(Default)]
pub struct FeedSlot {
    feed: Option<TaskFeed>,
}

impl FeedSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_mut(&mut self) -> Option<&mut TaskFeed> {
        self.feed.as_mut()
    }

    /// Cancel and discard the current feed, if any.
    pub fn clear(&mut self) {
        if let Some(mut feed) = self.feed.take() {
            feed.cancel();
        }
    }

    /// Replace the current feed with one scoped to `identity`.
    pub async fn bind<S: TaskStore>(
        &mut self,
        store: &S,
        identity: &Identity,
    ) -> Result<&mut TaskFeed> {
        self.clear();
        let feed = store.subscribe(identity).await?;
        Ok(self.feed.insert(feed))
    }
}
