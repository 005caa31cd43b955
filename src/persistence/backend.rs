use crate::persistence::types::{PersistenceError, SlotKey};
use futures::future::BoxFuture;

/// Storage collaborator that persists save bytes for a slot.
///
/// Backends only move bytes; encoding the [`SaveFile`](super::SaveFile)
/// envelope is done by the callers. Futures returned here are polled on the
/// orchestrator's runtime, so they may complete on any worker thread.
pub trait SaveBackend: Send + Sync {
    /// Read the bytes stored in a slot.
    ///
    /// Returns `Ok(None)` when nothing has been saved to the slot yet.
    fn read<'a>(
        &'a self,
        slot: &'a SlotKey,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>, PersistenceError>>;

    /// Replace the contents of a slot, returning the number of bytes stored
    fn write<'a>(
        &'a self,
        slot: &'a SlotKey,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<u64, PersistenceError>>;

    /// Remove a slot, returning whether anything was removed
    fn delete<'a>(&'a self, slot: &'a SlotKey) -> BoxFuture<'a, Result<bool, PersistenceError>>;

    /// Whether a slot holds data
    fn exists<'a>(&'a self, slot: &'a SlotKey) -> BoxFuture<'a, Result<bool, PersistenceError>>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}
