//! Session lifecycle tests: initialization, unlock verification, locking.

use std::sync::Arc;

use jottery_client::{CreateNote, NoteService, Session};
use jottery_core::{Error, SortOrder};
use jottery_crypto::KeyManager;
use jottery_store::Store;

struct Device {
    session: Session,
    service: NoteService,
    keys: KeyManager,
}

async fn device() -> Device {
    let store = Arc::new(Store::in_memory().await.unwrap());
    let keys = KeyManager::new();
    Device {
        session: Session::new(store.clone(), keys.clone()),
        service: NoteService::new(store, keys.clone()),
        keys,
    }
}

#[tokio::test]
async fn test_fresh_init_and_first_note() {
    let device = device().await;
    device
        .session
        .initialize("correct horse battery staple")
        .await
        .unwrap();

    let note = device
        .service
        .create(CreateNote {
            content: "hello".into(),
            tags: vec!["x".into(), "y".into()],
            ..Default::default()
        })
        .await
        .unwrap();

    device.session.lock();
    assert!(device.session.is_locked());

    device
        .session
        .unlock("correct horse battery staple")
        .await
        .unwrap();

    let read = device.service.get(note.id).await.unwrap();
    assert_eq!(read.content, "hello");
    assert_eq!(read.tags, vec!["x", "y"]);
    assert_eq!(read.version, 1);
}

#[tokio::test]
async fn test_wrong_password_is_rejected_and_key_discarded() {
    let device = device().await;
    device
        .session
        .initialize("correct horse battery staple")
        .await
        .unwrap();
    device
        .service
        .create(CreateNote {
            content: "anchor".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    device.session.lock();

    let err = device.session.unlock("wrong").await.unwrap_err();
    assert!(matches!(err, Error::IncorrectPassword));
    assert!(device.keys.master_key().is_err());
    assert!(device.session.is_locked());
}

#[tokio::test]
async fn test_unlock_empty_store_is_provisional() {
    let device = device().await;
    device.session.initialize("first password").await.unwrap();
    device.session.lock();

    // Nothing to verify against; any password is provisionally accepted.
    device.session.unlock("other password").await.unwrap();
    assert!(!device.session.is_locked());
}

#[tokio::test]
async fn test_double_initialize_fails() {
    let device = device().await;
    device.session.initialize("password one").await.unwrap();
    let err = device.session.initialize("password two").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyInitialized));
}

#[tokio::test]
async fn test_unlock_uninitialized_fails() {
    let device = device().await;
    let err = device.session.unlock("anything").await.unwrap_err();
    assert!(matches!(err, Error::NotInitialized));
}

#[tokio::test]
async fn test_locked_service_calls_fail_closed() {
    let device = device().await;
    device.session.initialize("password").await.unwrap();
    device.session.lock();

    let err = device
        .service
        .create(CreateNote {
            content: "nope".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Locked));

    let err = device.service.list(SortOrder::Recent).await.unwrap_err();
    assert!(matches!(err, Error::Locked));
}

#[tokio::test]
async fn test_lock_clears_decrypted_cache() {
    let device = device().await;
    device.session.initialize("password").await.unwrap();
    let note = device
        .service
        .create(CreateNote {
            content: "cached".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    device.service.get(note.id).await.unwrap();
    assert!(device.service.cached_len() > 0);

    device.session.lock();
    device.service.clear_cache();
    assert_eq!(device.service.cached_len(), 0);
    assert!(device.keys.master_key().is_err());
}

#[tokio::test]
async fn test_wipe_is_terminal() {
    let device = device().await;
    device.session.initialize("password").await.unwrap();
    device
        .service
        .create(CreateNote {
            content: "gone".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    device.session.wipe().await.unwrap();
    assert!(device.session.is_locked());
    assert!(!device.session.is_initialized().await.unwrap());
    // A wiped key manager refuses a fresh unlock path entirely.
    assert!(device.keys.master_key().is_err());
}
