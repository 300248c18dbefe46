//! Remote task store adapter.
//!
//! Wraps a black-box document backend (queryable, patchable, subscribable,
//! owner-filtered) and translates between its wire representation and the
//! task entity model. Timestamps cross the boundary in the provider-native
//! seconds/nanos form; a missing or malformed remote timestamp is repaired
//! with the current time instead of failing the read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::session::Identity;
use crate::store::{SubscriptionHandle, TaskFeed, TaskSnapshot, TaskStore};
use crate::task::{Subtask, Task, TaskDraft, TaskPatch};

/// Provider-native temporal type (whole seconds since epoch plus nanos).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTimestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl RemoteTimestamp {
    pub fn from_datetime(value: DateTime<Utc>) -> Self {
        Self {
            seconds: value.timestamp(),
            nanos: value.timestamp_subsec_nanos(),
        }
    }

    /// Back to the portable representation; `None` when out of range.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos)
    }
}

/// One record as the remote collection stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// May be absent or unrepresentable in old records; repaired on read.
    #[serde(default)]
    pub due_date: Option<RemoteTimestamp>,
    pub completed: bool,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    /// Server-assigned on insert.
    #[serde(default)]
    pub created_at: Option<RemoteTimestamp>,
}

/// Typed partial merge at the wire level.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub notes: Option<Option<String>>,
    pub due_date: Option<RemoteTimestamp>,
    pub completed: Option<bool>,
    pub subtasks: Option<Vec<Subtask>>,
}

impl DocumentPatch {
    fn from_task_patch(patch: &TaskPatch) -> Self {
        Self {
            title: patch.title.clone(),
            notes: patch.notes.clone(),
            due_date: patch.due_date.map(RemoteTimestamp::from_datetime),
            completed: patch.completed,
            subtasks: patch.subtasks.clone(),
        }
    }

    fn apply(&self, doc: &mut RemoteDocument) {
        if let Some(title) = &self.title {
            doc.title = title.clone();
        }
        if let Some(notes) = &self.notes {
            doc.notes = notes.clone();
        }
        if let Some(due_date) = self.due_date {
            doc.due_date = Some(due_date);
        }
        if let Some(completed) = self.completed {
            doc.completed = completed;
        }
        if let Some(subtasks) = &self.subtasks {
            doc.subtasks = subtasks.clone();
        }
    }
}

/// The black-box remote collection contract the adapter consumes.
///
/// Owner scoping on every call is the access policy boundary; the backend
/// never returns or touches another owner's records.
pub trait DocumentBackend: Send + Sync + 'static {
    /// All documents owned by `owner_id`.
    fn query(&self, owner_id: &str) -> Result<Vec<RemoteDocument>>;

    /// Store a new document; the backend assigns the id and the creation
    /// timestamp.
    fn insert(&self, doc: RemoteDocument) -> Result<RemoteDocument>;

    /// Merge a partial update into an existing document.
    fn patch(&self, owner_id: &str, doc_id: &str, patch: DocumentPatch) -> Result<RemoteDocument>;

    /// Remove a document. Removing an absent id succeeds.
    fn remove(&self, owner_id: &str, doc_id: &str) -> Result<()>;

    /// Change notification feed; the value bumps on every committed write.
    fn changes(&self) -> watch::Receiver<u64>;
}

/// Decode a remote document, repairing absent/malformed timestamps.
pub fn decode_document(doc: RemoteDocument, now: DateTime<Utc>) -> Task {
    let due_date = doc
        .due_date
        .and_then(RemoteTimestamp::to_datetime)
        .unwrap_or(now);
    let created_at = doc
        .created_at
        .and_then(RemoteTimestamp::to_datetime)
        .unwrap_or(now);
    Task {
        id: doc.id,
        title: doc.title,
        notes: doc.notes,
        due_date,
        completed: doc.completed,
        subtasks: doc.subtasks,
        owner_id: doc.owner_id,
        created_at,
    }
}

fn encode_draft(draft: &TaskDraft, owner_id: &str) -> RemoteDocument {
    RemoteDocument {
        id: String::new(),
        owner_id: owner_id.to_string(),
        title: draft.title.clone(),
        notes: draft.notes.clone(),
        due_date: Some(RemoteTimestamp::from_datetime(draft.due_date)),
        completed: draft.completed,
        subtasks: draft.subtasks.clone(),
        created_at: None,
    }
}

/// Task store backed by a remote document collection.
pub struct RemoteStore<B: DocumentBackend> {
    backend: Arc<B>,
}

impl<B: DocumentBackend> RemoteStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

fn snapshot_for<B: DocumentBackend>(backend: &B, owner_id: &str) -> Result<TaskSnapshot> {
    let now = Utc::now();
    let mut tasks: Vec<Task> = backend
        .query(owner_id)?
        .into_iter()
        .map(|doc| decode_document(doc, now))
        .collect();
    // Deterministic base order; display ordering is applied at render time.
    tasks.sort_by(|left, right| {
        left.created_at
            .cmp(&right.created_at)
            .then_with(|| left.id.cmp(&right.id))
    });
    Ok(TaskSnapshot {
        generated_at: now,
        tasks,
    })
}

impl<B: DocumentBackend> TaskStore for RemoteStore<B> {
    async fn subscribe(&self, identity: &Identity) -> Result<TaskFeed> {
        let backend = Arc::clone(&self.backend);
        let owner = identity.uid.clone();

        let initial = snapshot_for(&*backend, &owner)?;
        let (tx, rx) = watch::channel(initial);
        let mut changes = backend.changes();
        changes.mark_unchanged();

        let pump = tokio::spawn(async move {
            loop {
                if changes.changed().await.is_err() {
                    break;
                }
                match snapshot_for(&*backend, &owner) {
                    Ok(snapshot) => {
                        if tx.send(snapshot).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(owner = %owner, error = %err, "snapshot refresh failed");
                    }
                }
            }
        });

        Ok(TaskFeed::new(rx, SubscriptionHandle::new(pump)))
    }

    async fn create(&self, identity: &Identity, draft: TaskDraft) -> Result<Task> {
        let doc = encode_draft(&draft, &identity.uid);
        let stored = self.backend.insert(doc)?;
        Ok(decode_document(stored, Utc::now()))
    }

    async fn update(&self, identity: &Identity, task_id: &str, patch: TaskPatch) -> Result<Task> {
        patch.validate()?;
        let wire = DocumentPatch::from_task_patch(&patch);
        let stored = self.backend.patch(&identity.uid, task_id, wire)?;
        Ok(decode_document(stored, Utc::now()))
    }

    async fn delete(&self, identity: &Identity, task_id: &str) -> Result<()> {
        self.backend.remove(&identity.uid, task_id)
    }
}

/// In-process document backend.
///
/// Serves as the loopback backend for tests and demos, with an offline
/// switch to exercise the persistence failure paths.
pub struct MemoryBackend {
    docs: Mutex<HashMap<String, RemoteDocument>>,
    revision: watch::Sender<u64>,
    offline: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            docs: Mutex::new(HashMap::new()),
            revision,
            offline: AtomicBool::new(false),
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simulate the backend becoming unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Store a document verbatim, bypassing server-side id/timestamp
    /// assignment. Lets tests plant legacy or malformed records.
    pub fn seed(&self, doc: RemoteDocument) {
        self.docs().insert(doc.id.clone(), doc);
        self.bump();
    }

    fn docs(&self) -> MutexGuard<'_, HashMap<String, RemoteDocument>> {
        self.docs.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Persistence("backend unreachable".to_string()));
        }
        Ok(())
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

impl DocumentBackend for MemoryBackend {
    fn query(&self, owner_id: &str) -> Result<Vec<RemoteDocument>> {
        self.check_online()?;
        let docs = self.docs();
        Ok(docs
            .values()
            .filter(|doc| doc.owner_id == owner_id)
            .cloned()
            .collect())
    }

    fn insert(&self, mut doc: RemoteDocument) -> Result<RemoteDocument> {
        self.check_online()?;
        if doc.id.is_empty() {
            doc.id = Uuid::new_v4().to_string();
        }
        doc.created_at = Some(RemoteTimestamp::from_datetime(Utc::now()));
        let stored = doc.clone();
        self.docs().insert(doc.id.clone(), doc);
        self.bump();
        Ok(stored)
    }

    fn patch(&self, owner_id: &str, doc_id: &str, patch: DocumentPatch) -> Result<RemoteDocument> {
        self.check_online()?;
        let mut docs = self.docs();
        let doc = docs
            .get_mut(doc_id)
            .filter(|doc| doc.owner_id == owner_id)
            .ok_or_else(|| Error::TaskNotFound(doc_id.to_string()))?;
        patch.apply(doc);
        let stored = doc.clone();
        drop(docs);
        self.bump();
        Ok(stored)
    }

    fn remove(&self, owner_id: &str, doc_id: &str) -> Result<()> {
        self.check_online()?;
        let mut docs = self.docs();
        let removed = docs
            .get(doc_id)
            .map_or(false, |doc| doc.owner_id == owner_id);
        if removed {
            docs.remove(doc_id);
            drop(docs);
            self.bump();
        }
        Ok(())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trips_without_drift() {
        let original: DateTime<Utc> = "2024-03-15T09:26:53.123456789Z".parse().unwrap();
        let wire = RemoteTimestamp::from_datetime(original);
        assert_eq!(wire.to_datetime(), Some(original));
    }

    #[test]
    fn malformed_timestamp_decodes_to_none() {
        let wire = RemoteTimestamp {
            seconds: i64::MAX,
            nanos: 0,
        };
        assert_eq!(wire.to_datetime(), None);
    }

    #[test]
    fn decode_repairs_missing_timestamps_with_now() {
        let now: DateTime<Utc> = "2024-06-01T00:00:00Z".parse().unwrap();
        let doc = RemoteDocument {
            id: "d1".to_string(),
            owner_id: "u1".to_string(),
            title: "legacy record".to_string(),
            notes: None,
            due_date: None,
            completed: false,
            subtasks: Vec::new(),
            created_at: Some(RemoteTimestamp {
                seconds: i64::MIN,
                nanos: 0,
            }),
        };
        let task = decode_document(doc, now);
        assert_eq!(task.due_date, now);
        assert_eq!(task.created_at, now);
    }
}
