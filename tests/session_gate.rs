use chrono::{Duration, Utc};
use tempfile::tempdir;
use taskzen::session::{FileIdentityProvider, Identity, SessionGate, SessionState};
use taskzen::store::{FeedSlot, LocalStore, MemoryBackend, RemoteStore, TaskStore};
use taskzen::task::TaskDraft;

fn draft(title: &str) -> TaskDraft {
    TaskDraft::new(title, Utc::now() + Duration::days(1)).expect("draft")
}

#[test]
fn session_survives_process_restart() -> anyhow::Result<()> {
    let dir = tempdir()?;

    let provider = FileIdentityProvider::new(dir.path(), None);
    let mut gate = SessionGate::new(provider);
    gate.resolve();
    let identity = gate.sign_in_anonymous()?;

    // A fresh gate over the same data dir resolves to the same identity.
    let provider = FileIdentityProvider::new(dir.path(), None);
    let mut gate = SessionGate::new(provider);
    assert_eq!(*gate.state(), SessionState::Loading);
    gate.resolve();
    assert_eq!(gate.identity()?, &identity);
    Ok(())
}

#[test]
fn sign_out_then_restart_is_unauthenticated() -> anyhow::Result<()> {
    let dir = tempdir()?;

    let provider = FileIdentityProvider::new(dir.path(), None);
    let mut gate = SessionGate::new(provider);
    gate.resolve();
    gate.sign_in_anonymous()?;
    gate.sign_out()?;

    let provider = FileIdentityProvider::new(dir.path(), None);
    let mut gate = SessionGate::new(provider);
    gate.resolve();
    assert_eq!(*gate.state(), SessionState::Unauthenticated);
    Ok(())
}

#[tokio::test]
async fn rebinding_a_feed_never_leaks_the_previous_identity() {
    let store = RemoteStore::new(MemoryBackend::new());
    let alice = Identity::federated("alice");
    let bob = Identity::federated("bob");

    store.create(&alice, draft("Alice secret")).await.expect("create");

    let mut slot = FeedSlot::new();
    let feed = slot.bind(&store, &alice).await.expect("bind alice");
    assert_eq!(feed.snapshot().tasks.len(), 1);

    // Switching identities tears the old feed down before subscribing.
    let feed = slot.bind(&store, &bob).await.expect("bind bob");
    assert!(feed.snapshot().tasks.is_empty());

    // New writes by the old identity never reach the rebound feed.
    store.create(&alice, draft("Another secret")).await.expect("create");
    store.create(&bob, draft("Bob task")).await.expect("create");
    let feed = slot.feed_mut().expect("bound feed");
    feed.changed().await.expect("feed open");
    let tasks = feed.latest().tasks;
    assert!(tasks.iter().all(|task| task.owner_id == "bob"));
}

#[tokio::test]
async fn clearing_the_slot_cancels_the_feed() {
    let dir = tempdir().expect("tempdir");
    let store = LocalStore::open(dir.path()).expect("open");
    let user = Identity::anonymous("guest-1");

    let mut slot = FeedSlot::new();
    slot.bind(&store, &user).await.expect("bind");
    assert!(slot.feed_mut().is_some());

    slot.clear();
    assert!(slot.feed_mut().is_none());
}
