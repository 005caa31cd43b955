use crate::persistence::{SaveBackend, SaveFile, SlotKey};
use crate::save::error::CommitRejection;
use crate::save::owner::{LocalPlayer, OwnerContext};
use crate::save::record::{SaveHandleKind, SaveRecord};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

/// Save request bookkeeping of a handle.
///
/// `current` counts every commit that was scheduled. The other two counters
/// hold the highest request token that finished with that outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveRequestCounters {
    pub current: u64,
    pub last_successful: u64,
    pub last_error: u64,
}

impl SaveRequestCounters {
    pub fn is_save_in_progress(&self) -> bool {
        self.current > self.last_successful.max(self.last_error)
    }
}

/// Result of a commit, as reported to the commit's completion callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub slot_name: String,
    pub user_index: i32,
    pub success: bool,
    /// Request token the commit was scheduled with
    pub request: u64,
}

/// Commit that passed validation and holds its request token.
///
/// Keeps the owning player alive until the commit is scheduled, so scheduling
/// cannot fail once this exists.
pub(crate) struct PreparedCommit {
    request: u64,
    save_file: SaveFile,
    player: Arc<LocalPlayer>,
}

/// One player's save data plus the means to persist it.
///
/// Handles are shared as `Arc<SaveDataHandle>`; the payload sits behind a lock
/// so game code can edit it while a commit snapshot is being written.
pub struct SaveDataHandle {
    kind: SaveHandleKind,
    slot_name: String,
    owner: OwnerContext,
    record: RwLock<SaveRecord>,
    requests: Mutex<SaveRequestCounters>,
    backend: Arc<dyn SaveBackend>,
    runtime: Handle,
}

impl SaveDataHandle {
    /// Create a handle holding a fresh default record
    pub(crate) fn create(
        kind: SaveHandleKind,
        slot_name: impl Into<String>,
        owner: OwnerContext,
        backend: Arc<dyn SaveBackend>,
        runtime: Handle,
    ) -> Arc<Self> {
        Self::with_record(kind, slot_name, owner, kind.new_record(), backend, runtime)
    }

    /// Rebuild a handle from a stored envelope, keeping the stored kind
    pub(crate) fn from_save_file(
        save_file: SaveFile,
        slot_name: impl Into<String>,
        owner: OwnerContext,
        backend: Arc<dyn SaveBackend>,
        runtime: Handle,
    ) -> Arc<Self> {
        Self::with_record(
            save_file.kind,
            slot_name,
            owner,
            save_file.record,
            backend,
            runtime,
        )
    }

    fn with_record(
        kind: SaveHandleKind,
        slot_name: impl Into<String>,
        owner: OwnerContext,
        record: SaveRecord,
        backend: Arc<dyn SaveBackend>,
        runtime: Handle,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            slot_name: slot_name.into(),
            owner,
            record: RwLock::new(record),
            requests: Mutex::new(SaveRequestCounters::default()),
            backend,
            runtime,
        })
    }

    pub fn kind(&self) -> SaveHandleKind {
        self.kind
    }

    pub fn slot_name(&self) -> &str {
        &self.slot_name
    }

    pub fn owner(&self) -> &OwnerContext {
        &self.owner
    }

    pub fn user_index(&self) -> i32 {
        self.owner.user_index()
    }

    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.slot_name.clone(), self.owner.user_index())
    }

    /// Snapshot of the payload
    pub fn record(&self) -> SaveRecord {
        self.record.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Edit the payload in place
    pub fn update<R>(&self, f: impl FnOnce(&mut SaveRecord) -> R) -> R {
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut record)
    }

    pub fn property(&self, key: &str) -> Option<serde_json::Value> {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .properties
            .get(key)
            .cloned()
    }

    /// Set a game property, returning the previous value
    pub fn set_property(
        &self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.update(|record| record.properties.insert(key.into(), value.into()))
    }

    /// Replace the payload with the default record of this handle's kind
    pub fn reset_to_default(&self) {
        self.update(|record| *record = self.kind.new_record());
    }

    pub fn request_counters(&self) -> SaveRequestCounters {
        *self.lock_requests()
    }

    /// Whether a commit was scheduled and has not reported back yet
    pub fn is_save_in_progress(&self) -> bool {
        self.lock_requests().is_save_in_progress()
    }

    /// Whether the most recent finished commit succeeded
    pub fn was_last_save_successful(&self) -> bool {
        let requests = self.lock_requests();
        requests.last_successful > requests.last_error
    }

    /// Envelope of the current payload
    pub fn to_save_file(&self) -> SaveFile {
        SaveFile::new(self.kind, &self.slot_key(), self.record())
    }

    /// Schedule a write of this handle to its slot.
    ///
    /// The owner must still be alive and the slot name non-empty; otherwise
    /// nothing is scheduled and `false` is returned. The pre-save hook runs
    /// before this returns, and the write uses the payload as it is at that
    /// point. `on_complete` runs on a runtime worker once the backend reports
    /// back, unless the owner has gone away by then.
    pub fn async_commit<F>(self: &Arc<Self>, on_complete: F) -> bool
    where
        F: FnOnce(CommitOutcome) + Send + 'static,
    {
        match self.prepare_commit(false) {
            Ok(prepared) => {
                self.schedule_commit(prepared, on_complete);
                true
            }
            Err(rejection) => {
                error!(
                    "async_commit rejected for slot '{}': {}",
                    self.slot_name, rejection
                );
                false
            }
        }
    }

    /// Validate a commit, take its request token and run the pre-save hook.
    ///
    /// With `exclusive` set, the commit is refused while an earlier one has
    /// not reported back. The check and the token increment happen under one
    /// lock, so concurrent callers cannot both pass.
    pub(crate) fn prepare_commit(&self, exclusive: bool) -> Result<PreparedCommit, CommitRejection> {
        let player = self.owner.player().ok_or(CommitRejection::OwnerGone)?;

        if self.slot_name.is_empty() {
            return Err(CommitRejection::EmptySlotName);
        }

        let request = {
            let mut requests = self.lock_requests();
            if exclusive && requests.is_save_in_progress() {
                return Err(CommitRejection::SaveInProgress);
            }
            requests.current += 1;
            requests.current
        };

        let slot = self.slot_key();
        let save_file = self.update(|record| {
            self.kind.prepare_for_save(record);
            SaveFile::new(self.kind, &slot, record.clone())
        });

        Ok(PreparedCommit {
            request,
            save_file,
            player,
        })
    }

    /// Spawn the write of a prepared commit
    pub(crate) fn schedule_commit<F>(self: &Arc<Self>, prepared: PreparedCommit, on_complete: F)
    where
        F: FnOnce(CommitOutcome) + Send + 'static,
    {
        let PreparedCommit {
            request,
            save_file,
            player,
        } = prepared;
        let slot = self.slot_key();
        let handle = Arc::clone(self);

        debug!(
            "Scheduling commit of slot {} for {} (request {})",
            slot,
            player.display_name(),
            request
        );

        self.runtime.spawn(async move {
            let result = match save_file.to_bytes() {
                Ok(bytes) => handle.backend.write(&slot, bytes).await,
                Err(e) => Err(e),
            };

            let success = match result {
                Ok(bytes_written) => {
                    debug!(
                        "Commit of slot {} (request {}) wrote {} bytes",
                        slot, request, bytes_written
                    );
                    true
                }
                Err(e) => {
                    warn!(
                        "Commit of slot {} (request {}) failed on {} backend: {}",
                        slot,
                        request,
                        handle.backend.backend_name(),
                        e
                    );
                    false
                }
            };

            if !handle.owner.is_valid() {
                debug!(
                    "Local player for slot {} is gone, dropping commit completion",
                    slot
                );
                return;
            }

            handle.process_save_complete(request, success);
            on_complete(CommitOutcome {
                slot_name: slot.slot_name,
                user_index: slot.user_index,
                success,
                request,
            });
        });
    }

    fn process_save_complete(&self, request: u64, success: bool) {
        let mut requests = self.lock_requests();
        if success {
            requests.last_successful = requests.last_successful.max(request);
        } else {
            requests.last_error = requests.last_error.max(request);
        }
    }

    fn lock_requests(&self) -> MutexGuard<'_, SaveRequestCounters> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SaveDataHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveDataHandle")
            .field("kind", &self.kind)
            .field("slot_name", &self.slot_name)
            .field("user_index", &self.owner.user_index())
            .field("backend", &self.backend.backend_name())
            .field("requests", &self.request_counters())
            .finish()
    }
}
