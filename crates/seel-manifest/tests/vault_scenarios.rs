//! Integration test: register → write → read → remove against in-memory storage
//!
//! Exercises the full envelope pipeline (content key, AES-GCM, age wrap)
//! through the manifest store with OpenDAL's in-memory backend.

mod common;

use std::sync::Arc;

use common::{memory_backend, pointer_of, vault};
use seel_core::SeelError;
use seel_manifest::{ManifestEvent, SessionState};
use seel_secrets::MemoryStore;

#[tokio::test]
async fn register_write_read_remove() {
    let device = Arc::new(MemoryStore::new());
    let vault = vault(device.clone(), Arc::new(memory_backend()));

    let state = vault.session().register().await.unwrap();
    assert!(matches!(state, SessionState::Active { .. }));

    let entry = vault
        .files()
        .write_file("notes/todo.md", "todo.md", "text/markdown", b"- buy lentils\n")
        .await
        .unwrap();
    assert_eq!(entry.size, Some(14));
    assert_eq!(entry.name, "todo.md");

    let content = vault.files().read_file("notes/todo.md").await.unwrap();
    assert_eq!(content.as_deref(), Some(&b"- buy lentils\n"[..]));

    assert!(vault.files().remove_file("notes/todo.md").await.unwrap());
    assert_eq!(vault.files().read_file("notes/todo.md").await.unwrap(), None);
    assert!(!vault.files().remove_file("notes/todo.md").await.unwrap());
}

#[tokio::test]
async fn ciphertext_on_backend_is_not_plaintext() {
    let device = Arc::new(MemoryStore::new());
    let backend = Arc::new(memory_backend());
    let vault = vault(device, backend.clone());
    vault.session().register().await.unwrap();

    let entry = vault
        .files()
        .write_file("notes/secret.md", "secret.md", "text/markdown", b"the plaintext")
        .await
        .unwrap();

    use seel_storage::BlobBackend;
    let stored = backend.get(&entry.cid).await.unwrap();
    assert_ne!(stored, b"the plaintext");
    assert!(!stored.windows(9).any(|w| w == b"plaintext"));
}

#[tokio::test]
async fn sequential_overwrite_keeps_count_and_ctime() {
    let device = Arc::new(MemoryStore::new());
    let vault = vault(device, Arc::new(memory_backend()));
    vault.session().register().await.unwrap();

    let first = vault
        .files()
        .write_file("gallery/cat.jpg", "cat.jpg", "image/jpeg", b"v1")
        .await
        .unwrap();
    let second = vault
        .files()
        .write_file("gallery/cat.jpg", "cat.jpg", "image/jpeg", b"version two")
        .await
        .unwrap();

    assert_eq!(second.ctime, first.ctime);
    assert!(second.mtime >= first.mtime);
    assert_ne!(second.iv, first.iv);

    let listed = vault.files().list_files("gallery/").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].1, second);
    assert_eq!(
        vault.files().read_file("gallery/cat.jpg").await.unwrap().unwrap(),
        b"version two"
    );
}

#[tokio::test]
async fn get_is_idempotent() {
    let device = Arc::new(MemoryStore::new());
    let vault = vault(device.clone(), Arc::new(memory_backend()));
    vault.session().register().await.unwrap();
    vault
        .files()
        .write_file("notes/a.md", "a.md", "text/markdown", b"a")
        .await
        .unwrap();

    let pointer = pointer_of(&device).await;
    let a = vault.manifest().get("notes/a.md").await.unwrap();
    let b = vault.manifest().get("notes/a.md").await.unwrap();
    assert_eq!(a, b);
    assert!(a.is_some());
    assert_eq!(pointer_of(&device).await, pointer, "reads never move the pointer");
    assert_eq!(vault.manifest().get("notes/missing.md").await.unwrap(), None);
}

#[tokio::test]
async fn list_is_prefix_filtered_newest_first() {
    let device = Arc::new(MemoryStore::new());
    let vault = vault(device, Arc::new(memory_backend()));
    vault.session().register().await.unwrap();

    for name in ["one", "two", "three"] {
        vault
            .files()
            .write_file(&format!("notes/{name}.md"), name, "text/markdown", name.as_bytes())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(3)).await;
    }
    vault
        .files()
        .write_file("gallery/dog.png", "dog.png", "image/png", b"png")
        .await
        .unwrap();

    let notes: Vec<String> = vault
        .files()
        .list_files("notes/")
        .await
        .unwrap()
        .into_iter()
        .map(|(path, _)| path)
        .collect();
    assert_eq!(notes, vec!["notes/three.md", "notes/two.md", "notes/one.md"]);
}

#[tokio::test]
async fn history_walks_previous_links() {
    let device = Arc::new(MemoryStore::new());
    let vault = vault(device.clone(), Arc::new(memory_backend()));
    vault.session().register().await.unwrap();
    let initial = pointer_of(&device).await.unwrap();

    vault
        .files()
        .write_file("notes/a.md", "a.md", "text/markdown", b"a")
        .await
        .unwrap();
    vault
        .files()
        .write_file("notes/b.md", "b.md", "text/markdown", b"b")
        .await
        .unwrap();

    let history = vault.manifest().history(10).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(Some(&history[0]), pointer_of(&device).await.as_ref());
    assert_eq!(history[2], initial);

    assert_eq!(vault.manifest().history(2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn removing_absent_path_publishes_nothing() {
    let device = Arc::new(MemoryStore::new());
    let vault = vault(device.clone(), Arc::new(memory_backend()));
    vault.session().register().await.unwrap();
    let before = pointer_of(&device).await;

    assert!(!vault.files().remove_file("notes/ghost.md").await.unwrap());
    assert_eq!(pointer_of(&device).await, before);
}

#[tokio::test]
async fn events_report_publishes_and_session_changes() {
    let device = Arc::new(MemoryStore::new());
    let vault = vault(device, Arc::new(memory_backend()));
    let mut events = vault.subscribe();

    vault.session().register().await.unwrap();
    assert!(matches!(
        events.recv().await.unwrap(),
        ManifestEvent::Published { previous: None, attempts: 1, .. }
    ));
    let user_id = vault.session().user_id().await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        ManifestEvent::SessionChanged { user_id }
    );

    vault
        .files()
        .write_file("notes/a.md", "a.md", "text/markdown", b"a")
        .await
        .unwrap();
    assert!(matches!(
        events.recv().await.unwrap(),
        ManifestEvent::Published { previous: Some(_), attempts: 1, .. }
    ));

    vault.session().logout().await.unwrap();
    assert_eq!(events.recv().await.unwrap(), ManifestEvent::SessionCleared);
}

#[tokio::test]
async fn writes_require_login() {
    let device = Arc::new(MemoryStore::new());
    let vault = vault(device, Arc::new(memory_backend()));

    let err = vault
        .files()
        .write_file("notes/a.md", "a.md", "text/markdown", b"a")
        .await
        .unwrap_err();
    assert!(matches!(err, SeelError::NotLoggedIn));
}
