//! Integration test: session lifecycle and moving an account between devices
//!
//! Each "device" is its own in-memory secure store; both share one blob backend.

mod common;

use std::sync::Arc;

use common::{memory_backend, pointer_of, vault};
use seel_core::{ContentId, SeelError};
use seel_manifest::{SessionState, SyncPayload};
use seel_secrets::{keys, MemoryStore, SecureStore};

#[tokio::test]
async fn export_on_a_import_on_b() {
    let backend = Arc::new(memory_backend());
    let device_a = Arc::new(MemoryStore::new());
    let device_b = Arc::new(MemoryStore::new());
    let a = vault(device_a.clone(), backend.clone());
    let b = vault(device_b.clone(), backend.clone());

    a.session().register().await.unwrap();
    a.files()
        .write_file("gallery/cat.jpg", "cat.jpg", "image/jpeg", b"\xff\xd8 jpeg bytes")
        .await
        .unwrap();

    let link = a
        .session()
        .export_credentials()
        .await
        .unwrap()
        .to_link_fragment()
        .unwrap();
    let state = b
        .session()
        .import_credentials(SyncPayload::parse(&link).unwrap())
        .await
        .unwrap();

    assert_eq!(b.session().user_id().await, a.session().user_id().await);
    assert!(matches!(state, SessionState::Active { .. }));
    assert_eq!(
        b.files().read_file("gallery/cat.jpg").await.unwrap().unwrap(),
        b"\xff\xd8 jpeg bytes"
    );
    assert_eq!(
        b.manifest().get("gallery/cat.jpg").await.unwrap(),
        a.manifest().get("gallery/cat.jpg").await.unwrap()
    );

    // B's writes are readable by A once A follows B's pointer.
    b.files()
        .write_file("notes/from-b.md", "from-b.md", "text/markdown", b"hi from b")
        .await
        .unwrap();
    let b_pointer = pointer_of(&device_b).await.unwrap();
    device_a
        .put(keys::MANIFEST_POINTER, b_pointer.as_str().as_bytes())
        .await
        .unwrap();
    assert_eq!(
        a.files().read_file("notes/from-b.md").await.unwrap().unwrap(),
        b"hi from b"
    );
}

#[tokio::test]
async fn export_requires_login() {
    let v = vault(Arc::new(MemoryStore::new()), Arc::new(memory_backend()));
    let err = v.session().export_credentials().await.unwrap_err();
    assert!(matches!(err, SeelError::NotLoggedIn));
}

#[tokio::test]
async fn import_with_bad_pointer_rolls_back() {
    let backend = Arc::new(memory_backend());
    let device_a = Arc::new(MemoryStore::new());
    let device_b = Arc::new(MemoryStore::new());
    let a = vault(device_a, backend.clone());
    let b = vault(device_b.clone(), backend.clone());

    a.session().register().await.unwrap();
    b.session().register().await.unwrap();

    let mut payload = a.session().export_credentials().await.unwrap();
    payload.manifest_pointer = ContentId::new(format!("b3-{}", "f".repeat(64)));

    let err = b.session().import_credentials(payload).await.unwrap_err();
    assert!(matches!(err, SeelError::ManifestUnreachable { .. }));

    // B's previous account is gone too: import replaces, then rolls back to empty.
    assert_eq!(device_b.get(keys::KEY_PAIR).await.unwrap(), None);
    assert_eq!(pointer_of(&device_b).await, None);
    assert_eq!(b.session().load().await.unwrap(), SessionState::LoggedOut);
}

#[tokio::test]
async fn import_of_foreign_pointer_is_identity_mismatch() {
    let backend = Arc::new(memory_backend());
    let a = vault(Arc::new(MemoryStore::new()), backend.clone());
    let c = vault(Arc::new(MemoryStore::new()), backend.clone());
    let device_b = Arc::new(MemoryStore::new());
    let b = vault(device_b.clone(), backend.clone());

    a.session().register().await.unwrap();
    c.session().register().await.unwrap();

    let mut payload = a.session().export_credentials().await.unwrap();
    payload.manifest_pointer = c.session().export_credentials().await.unwrap().manifest_pointer;

    let err = b.session().import_credentials(payload).await.unwrap_err();
    assert!(matches!(err, SeelError::IdentityMismatch));
    assert_eq!(device_b.get(keys::KEY_PAIR).await.unwrap(), None);
}

#[tokio::test]
async fn malformed_import_leaves_state_alone() {
    let device = Arc::new(MemoryStore::new());
    let v = vault(device.clone(), Arc::new(memory_backend()));
    v.session().register().await.unwrap();
    let pointer = pointer_of(&device).await;

    let payload = SyncPayload::parse(
        r#"{"privateKey": {"kty": "age-x25519", "key": "garbage"}, "manifestPointer": "b3-x"}"#,
    )
    .unwrap();
    let err = v.session().import_credentials(payload).await.unwrap_err();
    assert!(matches!(err, SeelError::InvalidSyncPayload(_)));
    assert_eq!(pointer_of(&device).await, pointer);
    assert!(v.session().require_pair().await.is_ok());
}

#[tokio::test]
async fn blank_pointer_import_keeps_existing_session() {
    let backend = Arc::new(memory_backend());
    let a = vault(Arc::new(MemoryStore::new()), backend.clone());
    let device_b = Arc::new(MemoryStore::new());
    let b = vault(device_b.clone(), backend);

    a.session().register().await.unwrap();
    let before = b.session().register().await.unwrap();
    let pointer = pointer_of(&device_b).await;

    for blank in ["", "  "] {
        let mut payload = a.session().export_credentials().await.unwrap();
        payload.manifest_pointer = ContentId::new(blank);

        let err = b.session().import_credentials(payload).await.unwrap_err();
        assert!(matches!(err, SeelError::InvalidSyncPayload(_)), "{blank:?}: {err:?}");
    }

    assert_eq!(pointer_of(&device_b).await, pointer);
    assert!(device_b.get(keys::KEY_PAIR).await.unwrap().is_some());
    assert_eq!(b.session().state().await.unwrap(), before);
}

#[tokio::test]
async fn load_with_keys_but_no_pointer_is_corrupt() {
    let device = Arc::new(MemoryStore::new());
    let v = vault(device.clone(), Arc::new(memory_backend()));
    v.session().register().await.unwrap();
    device.delete(keys::MANIFEST_POINTER).await.unwrap();

    let fresh = vault(device.clone(), Arc::new(memory_backend()));
    let err = fresh.session().load().await.unwrap_err();
    assert!(matches!(err, SeelError::CorruptLocalState(_)));
    assert_eq!(device.get(keys::KEY_PAIR).await.unwrap(), None);
    assert_eq!(fresh.session().load().await.unwrap(), SessionState::LoggedOut);
}

#[tokio::test]
async fn load_drops_stray_pointer() {
    let device = Arc::new(MemoryStore::new());
    device
        .put(keys::MANIFEST_POINTER, b"b3-orphan")
        .await
        .unwrap();

    let v = vault(device.clone(), Arc::new(memory_backend()));
    assert_eq!(v.session().load().await.unwrap(), SessionState::LoggedOut);
    assert_eq!(pointer_of(&device).await, None);
}

#[tokio::test]
async fn register_is_idempotent_and_logout_clears() {
    let device = Arc::new(MemoryStore::new());
    let backend = Arc::new(memory_backend());
    let v = vault(device.clone(), backend.clone());

    let first = v.session().register().await.unwrap();
    let again = vault(device.clone(), backend).session().register().await.unwrap();
    assert_eq!(first, again);

    v.session().logout().await.unwrap();
    v.session().logout().await.unwrap();
    assert_eq!(device.get(keys::KEY_PAIR).await.unwrap(), None);
    assert_eq!(pointer_of(&device).await, None);
    assert!(matches!(
        v.session().require_pair().await,
        Err(SeelError::NotLoggedIn)
    ));
}

#[tokio::test]
async fn reload_restores_session() {
    let device = Arc::new(MemoryStore::new());
    let backend = Arc::new(memory_backend());
    let v = vault(device.clone(), backend.clone());
    v.session().register().await.unwrap();
    v.files()
        .write_file("notes/persist.md", "persist.md", "text/markdown", b"still here")
        .await
        .unwrap();

    let restarted = vault(device, backend);
    let state = restarted.session().load().await.unwrap();
    assert_eq!(state, v.session().state().await.unwrap());
    assert_eq!(
        restarted.files().read_file("notes/persist.md").await.unwrap().unwrap(),
        b"still here"
    );
}
