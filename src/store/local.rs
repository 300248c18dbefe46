//! Local fallback task store.
//!
//! Used only when no remote backend is configured. Each identity's tasks
//! live in one JSON document under the data dir, read on session start and
//! rewritten atomically under a file lock on every mutation. Subscriptions
//! re-emit after every local mutation and on external file changes, so a
//! live viewer in one terminal sees edits made from another.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use notify::{RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::lock::{LockedFile, DEFAULT_LOCK_TIMEOUT_MS};
use crate::session::Identity;
use crate::store::{SubscriptionHandle, TaskFeed, TaskSnapshot, TaskStore};
use crate::task::{Task, TaskDraft, TaskPatch};

const TASKS_SCHEMA_VERSION: &str = "taskzen.tasks.v1";

#[derive(Serialize, Deserialize)]
struct TaskFile {
    schema_version: String,
    updated_at: DateTime<Utc>,
    tasks: Vec<Task>,
}

impl TaskFile {
    fn new(tasks: Vec<Task>) -> Self {
        Self {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            updated_at: Utc::now(),
            tasks,
        }
    }
}

/// File-backed task store rooted at the data dir.
pub struct LocalStore {
    root: PathBuf,
    revision: watch::Sender<u64>,
}

impl LocalStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let (revision, _) = watch::channel(0);
        Ok(Self { root, revision })
    }

    /// Path of the identity's task document (`tasks_<uid>.json`).
    pub fn tasks_file(&self, identity: &Identity) -> PathBuf {
        self.root.join(format!("tasks_{}.json", file_key(&identity.uid)))
    }

    /// Current task collection; a missing file is an empty collection.
    pub fn load(&self, identity: &Identity) -> Result<Vec<Task>> {
        Ok(read_tasks(&self.tasks_file(identity)))
    }

    /// Read-modify-write under the file lock, then wake subscribers.
    fn mutate<T>(
        &self,
        identity: &Identity,
        apply: impl FnOnce(&mut Vec<Task>) -> Result<T>,
    ) -> Result<T> {
        let path = self.tasks_file(identity);
        let session = LockedFile::open(&path, DEFAULT_LOCK_TIMEOUT_MS)?;
        let mut tasks = match session.read()? {
            Some(data) => parse_tasks(&path, &data),
            None => Vec::new(),
        };
        let outcome = apply(&mut tasks)?;
        let data = serde_json::to_vec_pretty(&TaskFile::new(tasks))?;
        session.write(&data)?;
        drop(session);
        self.revision.send_modify(|rev| *rev += 1);
        Ok(outcome)
    }
}

fn read_tasks(path: &Path) -> Vec<Task> {
    match fs::read(path) {
        Ok(data) => parse_tasks(path, &data),
        Err(_) => Vec::new(),
    }
}

fn parse_tasks(path: &Path, data: &[u8]) -> Vec<Task> {
    match serde_json::from_slice::<TaskFile>(data) {
        Ok(file) => file.tasks,
        Err(err) => {
            // A damaged store file degrades to an empty collection rather
            // than blocking every command.
            tracing::warn!(path = %path.display(), error = %err, "unreadable task file");
            Vec::new()
        }
    }
}

/// Make an arbitrary uid safe as a file name fragment.
fn file_key(uid: &str) -> String {
    uid.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

impl TaskStore for LocalStore {
    async fn subscribe(&self, identity: &Identity) -> Result<TaskFeed> {
        let path = self.tasks_file(identity);
        let initial = TaskSnapshot::now(read_tasks(&path));
        let (tx, rx) = watch::channel(initial);
        let mut revision = self.revision.subscribe();

        let (fs_tx, mut fs_rx) = mpsc::unbounded_channel();
        let target = path.file_name().map(|name| name.to_os_string());
        let callback_tx = fs_tx.clone();
        let mut watcher = match notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| {
                if let Ok(event) = res {
                    let hit = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == target.as_deref());
                    if hit {
                        let _ = callback_tx.send(());
                    }
                }
            },
        ) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                tracing::warn!(error = %err, "file watcher unavailable; external edits not live");
                None
            }
        };
        if let Some(active) = watcher.as_mut() {
            if let Err(err) = active.watch(&self.root, RecursiveMode::NonRecursive) {
                tracing::warn!(error = %err, "file watcher unavailable; external edits not live");
                watcher = None;
            }
        }

        let pump = tokio::spawn(async move {
            // Both ends stay owned by the pump so the channels live exactly
            // as long as the subscription.
            let _watcher = watcher;
            let _fs_tx = fs_tx;
            loop {
                tokio::select! {
                    changed = revision.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = fs_rx.recv() => {}
                }
                let snapshot = TaskSnapshot::now(read_tasks(&path));
                if tx.send(snapshot).is_err() {
                    break;
                }
            }
        });

        Ok(TaskFeed::new(rx, SubscriptionHandle::new(pump)))
    }

    async fn create(&self, identity: &Identity, draft: TaskDraft) -> Result<Task> {
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            notes: draft.notes,
            due_date: draft.due_date,
            completed: draft.completed,
            subtasks: draft.subtasks,
            owner_id: identity.uid.clone(),
            created_at: Utc::now(),
        };
        let stored = task.clone();
        self.mutate(identity, move |tasks| {
            tasks.push(task);
            Ok(())
        })?;
        Ok(stored)
    }

    async fn update(&self, identity: &Identity, task_id: &str, patch: TaskPatch) -> Result<Task> {
        patch.validate()?;
        self.mutate(identity, |tasks| {
            let slot = tasks
                .iter_mut()
                .find(|task| task.id == task_id)
                .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
            let updated = patch.apply(slot);
            *slot = updated.clone();
            Ok(updated)
        })
    }

    async fn delete(&self, identity: &Identity, task_id: &str) -> Result<()> {
        self.mutate(identity, |tasks| {
            // Deleting an id that is already gone is a success.
            tasks.retain(|task| task.id != task_id);
            Ok(())
        })
    }
}
