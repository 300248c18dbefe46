use chrono::{Duration, Utc};
use taskzen::session::Identity;
use taskzen::store::remote::{RemoteDocument, RemoteTimestamp};
use taskzen::store::{MemoryBackend, RemoteStore, TaskStore};
use taskzen::task::{Subtask, TaskDraft, TaskPatch};
use taskzen::Error;

fn store() -> RemoteStore<MemoryBackend> {
    RemoteStore::new(MemoryBackend::new())
}

fn draft(title: &str) -> TaskDraft {
    TaskDraft::new(title, Utc::now() + Duration::days(1)).expect("draft")
}

#[tokio::test]
async fn create_then_subscribe_sees_the_task() {
    let store = store();
    let user = Identity::federated("u1");

    let created = store.create(&user, draft("Water plants")).await.expect("create");
    assert!(!created.id.is_empty());
    assert_eq!(created.owner_id, "u1");

    let feed = store.subscribe(&user).await.expect("subscribe");
    let snapshot = feed.snapshot();
    assert_eq!(snapshot.tasks.len(), 1);
    assert_eq!(snapshot.tasks[0].id, created.id);
}

#[tokio::test]
async fn subscribe_re_emits_after_every_mutation() {
    let store = store();
    let user = Identity::federated("u1");

    let mut feed = store.subscribe(&user).await.expect("subscribe");
    assert!(feed.latest().tasks.is_empty());

    let created = store.create(&user, draft("Water plants")).await.expect("create");
    feed.changed().await.expect("change after create");
    assert_eq!(feed.latest().tasks.len(), 1);

    store
        .update(&user, &created.id, TaskPatch::default().completed(true))
        .await
        .expect("update");
    feed.changed().await.expect("change after update");
    assert!(feed.latest().tasks[0].completed);

    store.delete(&user, &created.id).await.expect("delete");
    feed.changed().await.expect("change after delete");
    assert!(feed.latest().tasks.is_empty());
}

#[tokio::test]
async fn snapshots_are_scoped_to_the_owner() {
    let store = store();
    let alice = Identity::federated("alice");
    let bob = Identity::federated("bob");

    store.create(&alice, draft("Alice task")).await.expect("create");
    store.create(&bob, draft("Bob task")).await.expect("create");

    let feed = store.subscribe(&alice).await.expect("subscribe");
    let tasks = feed.snapshot().tasks;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Alice task");
}

#[tokio::test]
async fn update_patches_only_named_fields() {
    let store = store();
    let user = Identity::federated("u1");
    let created = store
        .create(
            &user,
            draft("Water plants").with_notes("front garden".to_string()),
        )
        .await
        .expect("create");

    let updated = store
        .update(
            &user,
            &created.id,
            TaskPatch::default().title("Water the garden".to_string()),
        )
        .await
        .expect("update");

    assert_eq!(updated.title, "Water the garden");
    assert_eq!(updated.notes.as_deref(), Some("front garden"));
    assert_eq!(updated.due_date, created.due_date);
}

#[tokio::test]
async fn update_missing_task_is_not_found() {
    let store = store();
    let user = Identity::federated("u1");
    let result = store
        .update(&user, "ghost", TaskPatch::default().completed(true))
        .await;
    assert!(matches!(result, Err(Error::TaskNotFound(_))));
}

#[tokio::test]
async fn update_rejects_invalid_patches() {
    let store = store();
    let user = Identity::federated("u1");
    let created = store.create(&user, draft("Water plants")).await.expect("create");

    let result = store
        .update(
            &user,
            &created.id,
            TaskPatch::default().title("   ".to_string()),
        )
        .await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[tokio::test]
async fn cross_owner_update_is_not_found() {
    let store = store();
    let alice = Identity::federated("alice");
    let bob = Identity::federated("bob");
    let created = store.create(&alice, draft("Alice task")).await.expect("create");

    let result = store
        .update(&bob, &created.id, TaskPatch::default().completed(true))
        .await;
    assert!(matches!(result, Err(Error::TaskNotFound(_))));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let store = store();
    let user = Identity::federated("u1");
    let created = store.create(&user, draft("Water plants")).await.expect("create");

    store.delete(&user, &created.id).await.expect("first delete");
    store.delete(&user, &created.id).await.expect("second delete");
    store.delete(&user, "never-existed").await.expect("unknown id");
}

#[tokio::test]
async fn offline_backend_surfaces_persistence_errors() {
    let store = store();
    let user = Identity::federated("u1");
    store.backend().set_offline(true);

    let result = store.create(&user, draft("Water plants")).await;
    assert!(matches!(result, Err(Error::Persistence(_))));

    let result = store.subscribe(&user).await;
    assert!(matches!(result, Err(Error::Persistence(_))));
}

#[tokio::test]
async fn cancelled_feed_stops_emitting() {
    let store = store();
    let user = Identity::federated("u1");

    let mut feed = store.subscribe(&user).await.expect("subscribe");
    feed.latest();
    feed.cancel();
    assert!(feed.is_cancelled());

    store.create(&user, draft("Water plants")).await.expect("create");
    assert!(feed.changed().await.is_err());
}

#[tokio::test]
async fn legacy_records_decode_with_repaired_timestamps() {
    let backend = MemoryBackend::new();
    let store = RemoteStore::new(backend.clone());
    let user = Identity::federated("u1");

    backend.seed(RemoteDocument {
        id: "legacy-1".to_string(),
        owner_id: "u1".to_string(),
        title: "Imported long ago".to_string(),
        notes: None,
        due_date: None,
        completed: false,
        subtasks: vec![Subtask::new("still here").expect("subtask")],
        created_at: Some(RemoteTimestamp {
            seconds: i64::MAX,
            nanos: 0,
        }),
    });

    let before = Utc::now();
    let feed = store.subscribe(&user).await.expect("subscribe");
    let after = Utc::now();

    let tasks = feed.snapshot().tasks;
    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.subtasks.len(), 1);
    assert!(task.due_date >= before && task.due_date <= after);
    assert!(task.created_at >= before && task.created_at <= after);
}
