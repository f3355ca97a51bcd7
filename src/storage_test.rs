use super::*;
use crate::artifact::{ArtifactLanguage, ReactArtifactCandidate, build_artifact};

fn artifact(message_id: &str, code: &str) -> ReactArtifact {
    build_artifact(message_id, ReactArtifactCandidate {
        code: code.into(),
        language: ArtifactLanguage::Tsx,
        title: Some("Counter".into()),
    })
}

fn key() -> StorageKey {
    StorageKey::new(Some("acme"), Some("conv-1"))
}

#[test]
fn keys_fall_back_to_sentinels() {
    assert_eq!(key().as_str(), "react-artifact:v1:acme:conv-1");
    assert_eq!(StorageKey::new(None, None).to_string(), "react-artifact:v1:default-tenant:draft");
    assert_eq!(StorageKey::new(Some("  "), Some("c")).as_str(), "react-artifact:v1:default-tenant:c");
}

#[test]
fn memory_round_trip() {
    let storage = MemoryStorage::new();
    let saved = artifact("msg-1", "export default function Counter() {}");
    save_artifact(&storage, &key(), &saved);
    assert_eq!(load_artifact(&storage, &key()), Some(saved));
    assert_eq!(load_artifact(&storage, &StorageKey::new(Some("acme"), Some("other"))), None);
}

#[test]
fn persisted_shape_is_camel_case_json() {
    let storage = MemoryStorage::new();
    save_artifact(&storage, &key(), &artifact("msg-1", "x"));
    let raw = storage.get_item(key().as_str()).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["sourceMessageId"], "msg-1");
    assert_eq!(value["language"], "tsx");
    assert!(value["updatedAt"].is_string());
}

#[test]
fn corrupt_or_incomplete_records_load_as_none() {
    let storage = MemoryStorage::new();
    storage.set_item(key().as_str(), "{not json").unwrap();
    assert_eq!(load_artifact(&storage, &key()), None);

    storage.set_item(key().as_str(), "{\"id\": \"a\"}").unwrap();
    assert_eq!(load_artifact(&storage, &key()), None);

    let mut empty_code = artifact("msg-1", "x");
    empty_code.code = "  ".into();
    storage.set_item(key().as_str(), &serde_json::to_string(&empty_code).unwrap()).unwrap();
    assert_eq!(load_artifact(&storage, &key()), None);

    let mut orphan = artifact("msg-1", "x");
    orphan.source_message_id = String::new();
    storage.set_item(key().as_str(), &serde_json::to_string(&orphan).unwrap()).unwrap();
    assert_eq!(load_artifact(&storage, &key()), None);
}

#[test]
fn file_storage_round_trip_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path().join("artifacts"));
    let saved = artifact("msg-7", "export default function App() {}");

    assert_eq!(load_artifact(&storage, &key()), None);
    save_artifact(&storage, &key(), &saved);
    assert!(storage.dir().join("react-artifact%3Av1%3Aacme%3Aconv-1.json").exists());
    assert_eq!(load_artifact(&storage, &key()), Some(saved));

    storage.remove_item(key().as_str()).unwrap();
    storage.remove_item(key().as_str()).unwrap();
    assert_eq!(load_artifact(&storage, &key()), None);
}

#[test]
fn file_storage_write_failures_are_swallowed() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, "a file, not a directory").unwrap();
    let storage = FileStorage::new(&blocker);

    save_artifact(&storage, &key(), &artifact("msg-1", "x"));
    let err = storage.set_item("k", "v").unwrap_err();
    assert_eq!(err.error_code(), "E_STORAGE_IO");
    assert_eq!(load_artifact(&storage, &key()), None);
}
