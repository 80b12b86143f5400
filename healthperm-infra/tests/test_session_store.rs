use healthperm::infra::lock_manager::LockManager;
use healthperm::infra::session_store::{SessionStore, SessionStoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Checkpoint {
    app: String,
    decided: Vec<String>,
}

fn checkpoint(app: &str, decided: &[&str]) -> Checkpoint {
    Checkpoint {
        app: app.to_string(),
        decided: decided.iter().map(|s| s.to_string()).collect(),
    }
}

#[test]
fn test_load_missing_session() {
    let temp = TempDir::new().unwrap();
    let store = SessionStore::new(temp.path()).unwrap();

    let loaded: Option<Checkpoint> = store.load("missing").unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_save_and_load() {
    let temp = TempDir::new().unwrap();
    let store = SessionStore::new(temp.path()).unwrap();

    let value = checkpoint("com.example.fit", &["READ_STEPS"]);
    store.save("s1", &value).unwrap();

    let loaded: Option<Checkpoint> = store.load("s1").unwrap();
    assert_eq!(loaded, Some(value));
    assert!(!temp.path().join("s1.tmp").exists());
}

#[test]
fn test_save_overwrites() {
    let temp = TempDir::new().unwrap();
    let store = SessionStore::new(temp.path()).unwrap();

    store.save("s1", &checkpoint("a", &[])).unwrap();
    store.save("s1", &checkpoint("a", &["READ_SLEEP", "READ_STEPS"])).unwrap();

    let loaded: Checkpoint = store.load("s1").unwrap().unwrap();
    assert_eq!(loaded.decided.len(), 2);
}

#[test]
fn test_remove_and_keys() {
    let temp = TempDir::new().unwrap();
    let store = SessionStore::new(temp.path()).unwrap();

    store.save("b", &checkpoint("b", &[])).unwrap();
    store.save("a", &checkpoint("a", &[])).unwrap();
    assert_eq!(store.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);

    assert!(store.remove("a").unwrap());
    assert!(!store.remove("a").unwrap());
    assert_eq!(store.keys().unwrap(), vec!["b".to_string()]);
}

#[test]
fn test_corrupted_document_is_an_error() {
    let temp = TempDir::new().unwrap();
    let store = SessionStore::new(temp.path()).unwrap();
    std::fs::write(temp.path().join("bad.json"), "{not json").unwrap();

    let result: Result<Option<Checkpoint>, _> = store.load("bad");
    assert!(matches!(result, Err(SessionStoreError::Json(_))));
}

#[test]
fn test_invalid_session_key() {
    let temp = TempDir::new().unwrap();
    let store = SessionStore::new(temp.path()).unwrap();

    for key in ["", "../escape", "a/b", "a\\b"] {
        let result = store.save(key, &checkpoint("x", &[]));
        assert!(matches!(result, Err(SessionStoreError::InvalidKey)), "key {:?}", key);
    }
}

#[test]
fn test_concurrent_saves_under_lock() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SessionStore::new(temp.path()).unwrap());
    let locks = LockManager::new(Duration::from_secs(5));

    let mut handles = vec![];
    for i in 0..10 {
        let store = Arc::clone(&store);
        let locks = locks.clone();
        handles.push(thread::spawn(move || {
            let _lock = locks.acquire("shared").unwrap();
            let mut current: Checkpoint = store
                .load("shared")
                .unwrap()
                .unwrap_or_else(|| checkpoint("shared", &[]));
            current.decided.push(format!("p{}", i));
            store.save("shared", &current).unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let loaded: Checkpoint = store.load("shared").unwrap().unwrap();
    assert_eq!(loaded.decided.len(), 10);
}
