use crate::persistence::backend::SaveBackend;
use crate::persistence::types::{PersistenceError, SaveFile, SlotKey};
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// In-memory save backend.
///
/// Used by tests and tools that do not want to touch the filesystem. Reads and
/// writes can be made to fail or to take longer on demand.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slots: DashMap<SlotKey, Vec<u8>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    read_delay_ms: AtomicU64,
    write_delay_ms: AtomicU64,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following read fail with a backend error
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every following write fail with a backend error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every following read wait before it completes
    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make every following write wait before it completes
    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of reads attempted, failed ones included
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of writes attempted, failed ones included
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Store raw bytes in a slot, bypassing failure injection
    pub fn insert_raw(&self, slot: SlotKey, bytes: Vec<u8>) {
        self.slots.insert(slot, bytes);
    }

    /// Store an encoded save file in the slot it names
    pub fn insert_save_file(&self, save_file: &SaveFile) -> Result<(), PersistenceError> {
        let slot = SlotKey::new(save_file.slot_name.clone(), save_file.user_index);
        self.slots.insert(slot, save_file.to_bytes()?);
        Ok(())
    }

    pub fn get_raw(&self, slot: &SlotKey) -> Option<Vec<u8>> {
        self.slots.get(slot).map(|entry| entry.value().clone())
    }

    /// Decode the save file stored in a slot, if any
    pub fn save_file(&self, slot: &SlotKey) -> Option<SaveFile> {
        self.get_raw(slot)
            .and_then(|bytes| SaveFile::from_bytes(&bytes).ok())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

async fn apply_delay(delay_ms: &AtomicU64) {
    let ms = delay_ms.load(Ordering::SeqCst);
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

impl SaveBackend for MemoryBackend {
    fn read<'a>(
        &'a self,
        slot: &'a SlotKey,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>, PersistenceError>> {
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            slot.validate()?;
            apply_delay(&self.read_delay_ms).await;

            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(PersistenceError::Backend(format!(
                    "read of {} failed",
                    slot
                )));
            }

            Ok(self.get_raw(slot))
        })
    }

    fn write<'a>(
        &'a self,
        slot: &'a SlotKey,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<u64, PersistenceError>> {
        Box::pin(async move {
            self.writes.fetch_add(1, Ordering::SeqCst);
            slot.validate()?;
            apply_delay(&self.write_delay_ms).await;

            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PersistenceError::Backend(format!(
                    "write of {} failed",
                    slot
                )));
            }

            let len = bytes.len() as u64;
            self.slots.insert(slot.clone(), bytes);
            debug!("Stored {} bytes in memory slot {}", len, slot);
            Ok(len)
        })
    }

    fn delete<'a>(&'a self, slot: &'a SlotKey) -> BoxFuture<'a, Result<bool, PersistenceError>> {
        Box::pin(async move { Ok(self.slots.remove(slot).is_some()) })
    }

    fn exists<'a>(&'a self, slot: &'a SlotKey) -> BoxFuture<'a, Result<bool, PersistenceError>> {
        Box::pin(async move { Ok(self.slots.contains_key(slot)) })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
