use crate::env;
use crate::persistence::header;
use crate::persistence::*;
use crate::save::{LocalPlayer, OwnerContext, SaveDataHandle, SaveHandleKind, SaveRecord};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// Helper function to create a test save directory
fn create_test_save_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

fn test_slot() -> SlotKey {
    SlotKey::new(env::test::TEST_SLOT_NAME, 0)
}

fn create_test_save_file() -> SaveFile {
    let mut record = SaveRecord::default();
    record
        .properties
        .insert("level".to_string(), serde_json::json!(7));
    SaveFile::new(SaveHandleKind::Standard, &test_slot(), record)
}

/// Run `load_or_create` and wait for its result
async fn load(
    kind: SaveHandleKind,
    owner: OwnerContext,
    backend: Arc<dyn SaveBackend>,
) -> Option<Arc<SaveDataHandle>> {
    let (tx, rx) = oneshot::channel();
    load_or_create(
        kind,
        owner,
        env::test::TEST_SLOT_NAME,
        backend,
        &Handle::current(),
        move |loaded| {
            let _ = tx.send(loaded);
        },
    );

    tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("Timed out waiting for load")
        .expect("Load callback dropped")
}

#[tokio::test]
async fn test_file_backend_write_and_read() {
    let temp_dir = create_test_save_dir();
    let backend = FileBackend::new(temp_dir.path(), FileBackendConfig::default()).unwrap();
    let save_file = create_test_save_file();

    let written = backend
        .write(&test_slot(), save_file.to_bytes().unwrap())
        .await
        .unwrap();
    assert!(written > 0);

    let on_disk = std::fs::read(backend.slot_path(&test_slot())).unwrap();
    assert!(on_disk.starts_with(&header::MAGIC));
    assert_eq!(on_disk.len() as u64, written);

    let bytes = backend.read(&test_slot()).await.unwrap().unwrap();
    assert_eq!(SaveFile::from_bytes(&bytes).unwrap(), save_file);
}

#[tokio::test]
async fn test_file_backend_missing_slot_reads_none() {
    let temp_dir = create_test_save_dir();
    let backend = FileBackend::new(temp_dir.path(), FileBackendConfig::default()).unwrap();

    assert!(backend.read(&test_slot()).await.unwrap().is_none());
    assert!(!backend.exists(&test_slot()).await.unwrap());
    assert!(!backend.delete(&test_slot()).await.unwrap());
}

#[tokio::test]
async fn test_file_backend_compression() {
    let temp_dir = create_test_save_dir();
    let config = FileBackendConfig {
        compress: true,
        checksum_validation: true,
    };
    let backend = FileBackend::new(temp_dir.path(), config).unwrap();
    let save_file = create_test_save_file();
    let plain = save_file.to_bytes().unwrap();

    backend.write(&test_slot(), plain.clone()).await.unwrap();

    let on_disk = std::fs::read(backend.slot_path(&test_slot())).unwrap();
    match header::unwrap(&on_disk).unwrap() {
        header::Unwrapped::WithHeader { header, payload } => {
            assert!(header.is_compressed());
            assert_eq!(&payload[..2], &[0x1f, 0x8b]);
        }
        header::Unwrapped::Headerless(_) => panic!("Save file has no header"),
    }

    // A backend without compression still reads compressed saves
    let reader = FileBackend::new(
        temp_dir.path(),
        FileBackendConfig {
            compress: false,
            checksum_validation: true,
        },
    )
    .unwrap();
    assert_eq!(reader.read(&test_slot()).await.unwrap().unwrap(), plain);
}

/// Flip the last byte of a slot's file, leaving its header intact
fn corrupt_payload(backend: &FileBackend, slot: &SlotKey) {
    let path = backend.slot_path(slot);
    let mut on_disk = std::fs::read(&path).unwrap();
    let last = on_disk.len() - 1;
    on_disk[last] ^= 0xff;
    std::fs::write(&path, on_disk).unwrap();
}

#[tokio::test]
async fn test_file_backend_detects_checksum_mismatch() {
    let temp_dir = create_test_save_dir();
    let backend = FileBackend::new(temp_dir.path(), FileBackendConfig::default()).unwrap();
    backend
        .write(&test_slot(), create_test_save_file().to_bytes().unwrap())
        .await
        .unwrap();

    corrupt_payload(&backend, &test_slot());

    let result = backend.read(&test_slot()).await;
    assert!(matches!(result, Err(PersistenceError::ChecksumMismatch(_))));
}

#[tokio::test]
async fn test_file_backend_skips_validation_when_disabled() {
    let temp_dir = create_test_save_dir();
    let checked = FileBackend::new(temp_dir.path(), FileBackendConfig::default()).unwrap();
    checked
        .write(&test_slot(), b"payload".to_vec())
        .await
        .unwrap();
    corrupt_payload(&checked, &test_slot());

    let unchecked = FileBackend::new(
        temp_dir.path(),
        FileBackendConfig {
            compress: false,
            checksum_validation: false,
        },
    )
    .unwrap();

    let bytes = unchecked.read(&test_slot()).await.unwrap().unwrap();
    assert_eq!(&bytes[..6], b"payloa");
    assert!(checked.read(&test_slot()).await.is_err());
}

#[tokio::test]
async fn test_file_backend_reads_headerless_files() {
    let temp_dir = create_test_save_dir();
    let backend = FileBackend::new(temp_dir.path(), FileBackendConfig::default()).unwrap();
    let plain = create_test_save_file().to_bytes().unwrap();

    std::fs::write(backend.slot_path(&test_slot()), &plain).unwrap();

    assert_eq!(backend.read(&test_slot()).await.unwrap().unwrap(), plain);
}

#[tokio::test]
async fn test_file_backend_rejects_truncated_header() {
    let temp_dir = create_test_save_dir();
    let backend = FileBackend::new(temp_dir.path(), FileBackendConfig::default()).unwrap();

    std::fs::write(backend.slot_path(&test_slot()), &header::MAGIC).unwrap();

    assert!(matches!(
        backend.read(&test_slot()).await,
        Err(PersistenceError::CorruptHeader(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_backend_concurrent_writes_stay_readable() {
    let temp_dir = create_test_save_dir();
    let backend = Arc::new(FileBackend::new(temp_dir.path(), FileBackendConfig::default()).unwrap());

    let mut writes = Vec::new();
    for writer in 0..16 {
        let backend = Arc::clone(&backend);
        writes.push(tokio::spawn(async move {
            let mut record = SaveRecord::default();
            record
                .properties
                .insert("writer".to_string(), serde_json::json!(writer));
            let save_file = SaveFile::new(SaveHandleKind::Standard, &test_slot(), record);
            backend
                .write(&test_slot(), save_file.to_bytes().unwrap())
                .await
        }));
    }
    for write in writes {
        write.await.unwrap().unwrap();
    }

    let bytes = backend.read(&test_slot()).await.unwrap().unwrap();
    let stored = SaveFile::from_bytes(&bytes).unwrap();
    let writer = stored.record.properties["writer"].as_i64().unwrap();
    assert!((0..16).contains(&writer));

    assert_eq!(backend.list_slots().await.unwrap(), vec![test_slot()]);
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_file_backend_leaves_no_temp_files() {
    let temp_dir = create_test_save_dir();
    let backend = FileBackend::new(temp_dir.path(), FileBackendConfig::default()).unwrap();

    for round in 0..3 {
        backend
            .write(&test_slot(), format!("round {}", round).into_bytes())
            .await
            .unwrap();
    }

    let leftovers = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(env::save::TEMP_FILE_PREFIX))
        })
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_file_backend_list_and_delete() {
    let temp_dir = create_test_save_dir();
    let backend = FileBackend::new(temp_dir.path(), FileBackendConfig::default()).unwrap();

    let slots = [
        SlotKey::new("Slot_A", 0),
        SlotKey::new("Slot_A", 1),
        SlotKey::new("Profile", 0),
    ];
    for slot in &slots {
        backend.write(slot, b"data".to_vec()).await.unwrap();
    }

    let listed = backend.list_slots().await.unwrap();
    assert_eq!(
        listed,
        vec![
            SlotKey::new("Profile", 0),
            SlotKey::new("Slot_A", 0),
            SlotKey::new("Slot_A", 1),
        ]
    );

    assert!(backend.delete(&slots[0]).await.unwrap());
    assert!(!backend.exists(&slots[0]).await.unwrap());
    assert!(!backend.delete(&slots[0]).await.unwrap());
    assert_eq!(backend.list_slots().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_invalid_slots_rejected() {
    let temp_dir = create_test_save_dir();
    let backend = FileBackend::new(temp_dir.path(), FileBackendConfig::default()).unwrap();

    for name in ["", "../escape", "nested/slot", ".hidden"] {
        let slot = SlotKey::new(name, 0);
        let result = backend.write(&slot, b"data".to_vec()).await;
        assert!(
            matches!(result, Err(PersistenceError::InvalidSlot(_))),
            "slot {:?} was accepted",
            name
        );
    }
}

#[tokio::test]
async fn test_memory_backend_failure_injection() {
    let backend = MemoryBackend::new();
    backend.set_fail_writes(true);

    assert!(backend.write(&test_slot(), b"data".to_vec()).await.is_err());
    assert!(backend.is_empty());

    backend.set_fail_writes(false);
    backend.write(&test_slot(), b"data".to_vec()).await.unwrap();
    assert_eq!(backend.len(), 1);

    backend.set_fail_reads(true);
    assert!(matches!(
        backend.read(&test_slot()).await,
        Err(PersistenceError::Backend(_))
    ));
    assert_eq!(backend.read_count(), 1);
    assert_eq!(backend.write_count(), 2);
}

#[tokio::test]
async fn test_load_or_create_creates_fresh_save() {
    let backend = Arc::new(MemoryBackend::new());
    let player = Arc::new(LocalPlayer::new(0, env::test::TEST_PLAYER_NAME));

    let handle = load(
        SaveHandleKind::Timestamped,
        OwnerContext::new(&player),
        backend.clone(),
    )
    .await
    .expect("Fresh save was not created");

    assert_eq!(handle.kind(), SaveHandleKind::Timestamped);
    assert_eq!(handle.slot_name(), env::test::TEST_SLOT_NAME);
    assert_eq!(handle.record().save_count, 0);
    assert!(backend.is_empty());
}

#[tokio::test]
async fn test_load_or_create_keeps_stored_kind() {
    let backend = Arc::new(MemoryBackend::new());
    let mut stored = create_test_save_file();
    stored.kind = SaveHandleKind::Timestamped;
    backend.insert_save_file(&stored).unwrap();
    let player = Arc::new(LocalPlayer::new(0, env::test::TEST_PLAYER_NAME));

    let handle = load(
        SaveHandleKind::Standard,
        OwnerContext::new(&player),
        backend.clone(),
    )
    .await
    .unwrap();

    assert_eq!(handle.kind(), SaveHandleKind::Timestamped);
    assert_eq!(handle.property("level"), Some(serde_json::json!(7)));
}

#[tokio::test]
async fn test_load_or_create_reports_read_failure() {
    let backend = Arc::new(MemoryBackend::new());
    backend.set_fail_reads(true);
    let player = Arc::new(LocalPlayer::new(0, env::test::TEST_PLAYER_NAME));

    let loaded = load(
        SaveHandleKind::Standard,
        OwnerContext::new(&player),
        backend.clone(),
    )
    .await;

    assert!(loaded.is_none());
}

#[tokio::test]
async fn test_handle_commit_reports_outcome() {
    let temp_dir = create_test_save_dir();
    let backend = Arc::new(FileBackend::new(temp_dir.path(), FileBackendConfig::default()).unwrap());
    let player = Arc::new(LocalPlayer::new(3, env::test::TEST_PLAYER_NAME));
    let handle = load(
        SaveHandleKind::Standard,
        OwnerContext::new(&player),
        backend.clone(),
    )
    .await
    .unwrap();
    handle.set_property("coins", 12);

    let (tx, rx) = oneshot::channel();
    assert!(handle.async_commit(move |outcome| {
        let _ = tx.send(outcome);
    }));
    assert!(handle.is_save_in_progress());

    let outcome = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.slot_name, env::test::TEST_SLOT_NAME);
    assert_eq!(outcome.user_index, 3);
    assert_eq!(outcome.request, 1);
    assert!(outcome.success);
    assert!(!handle.is_save_in_progress());
    assert_eq!(handle.request_counters().last_successful, 1);

    let bytes = backend
        .read(&SlotKey::new(env::test::TEST_SLOT_NAME, 3))
        .await
        .unwrap()
        .unwrap();
    let stored = SaveFile::from_bytes(&bytes).unwrap();
    assert_eq!(stored.user_index, 3);
    assert_eq!(stored.record.properties["coins"], serde_json::json!(12));
}

#[tokio::test]
async fn test_handle_commit_requires_live_owner() {
    let backend = Arc::new(MemoryBackend::new());
    let player = Arc::new(LocalPlayer::new(0, env::test::TEST_PLAYER_NAME));
    let handle = load(
        SaveHandleKind::Standard,
        OwnerContext::new(&player),
        backend.clone(),
    )
    .await
    .unwrap();

    drop(player);

    assert!(!handle.async_commit(|_| panic!("commit must not complete")));
    assert_eq!(handle.request_counters().current, 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.write_count(), 0);
}

#[tokio::test]
async fn test_handle_reset_to_default() {
    let backend = Arc::new(MemoryBackend::new());
    let player = Arc::new(LocalPlayer::new(0, env::test::TEST_PLAYER_NAME));
    let handle = load(
        SaveHandleKind::Standard,
        OwnerContext::new(&player),
        backend,
    )
    .await
    .unwrap();

    assert_eq!(handle.set_property("hp", 10), None);
    assert_eq!(handle.set_property("hp", 8), Some(serde_json::json!(10)));

    handle.reset_to_default();
    assert!(handle.property("hp").is_none());
}
