use crate::config::SaveSystemConfig;
use crate::persistence::{self, SaveBackend};
use crate::save::error::{CommitRejection, SaveError};
use crate::save::handle::{CommitOutcome, SaveDataHandle};
use crate::save::owner::{LocalPlayer, OwnerContext};
use crate::save::state::SaveState;
use crate::save::subscribers::{SaveStateListener, SubscriberList, SubscriptionId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Single authority over the player's save state and live save handle.
///
/// One orchestrator exists per session. It is not `Clone`: the session owns
/// it, and background completions only hold a weak reference, so dropping
/// the orchestrator turns pending completions into no-ops.
pub struct SaveOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    config: SaveSystemConfig,
    backend: Arc<dyn SaveBackend>,
    runtime: Handle,
    /// Held from a state change through its fan-out, and through a replay.
    /// Always taken before `core`.
    notify: Mutex<()>,
    core: Mutex<OrchestratorCore>,
    state_tx: watch::Sender<SaveState>,
    save_requests: AtomicU64,
}

struct OrchestratorCore {
    state: SaveState,
    current_handle: Option<Arc<SaveDataHandle>>,
    subscribers: SubscriberList,
}

impl SaveOrchestrator {
    /// Create an orchestrator that schedules persistence on the current tokio runtime
    pub fn new(config: SaveSystemConfig, backend: Arc<dyn SaveBackend>) -> Result<Self, SaveError> {
        let runtime = Handle::try_current().map_err(|e| SaveError::NoRuntime(e.to_string()))?;
        Self::with_runtime(config, backend, runtime)
    }

    /// Create an orchestrator bound to an explicit runtime.
    ///
    /// Use this when the orchestrator is built outside of the runtime, e.g. on
    /// a game thread that hands persistence work to a background runtime.
    pub fn with_runtime(
        config: SaveSystemConfig,
        backend: Arc<dyn SaveBackend>,
        runtime: Handle,
    ) -> Result<Self, SaveError> {
        config.validate()?;

        info!(
            "Save orchestrator ready: slot '{}', {} handles, {} backend",
            config.slot_name,
            config.handle_kind,
            backend.backend_name()
        );

        let (state_tx, _) = watch::channel(SaveState::Init);

        Ok(Self {
            inner: Arc::new(OrchestratorInner {
                config,
                backend,
                runtime,
                notify: Mutex::new(()),
                core: Mutex::new(OrchestratorCore {
                    state: SaveState::Init,
                    current_handle: None,
                    subscribers: SubscriberList::new(),
                }),
                state_tx,
                save_requests: AtomicU64::new(0),
            }),
        })
    }

    pub fn config(&self) -> &SaveSystemConfig {
        &self.inner.config
    }

    /// Start loading the player's save, creating it if the slot is empty.
    ///
    /// Moves to [`SaveState::LoadingStarted`] before returning; the load itself
    /// finishes in the background. Returns `false` without doing anything when
    /// there is no player or a save is already loaded. Calling it again while
    /// still loading retries the load.
    pub fn initialize(&self, owner: Option<Arc<LocalPlayer>>) -> bool {
        let Some(player) = owner else {
            error!("Save system initialized without a local player");
            return false;
        };

        let mut retry = false;
        let transitioned = self.inner.transition(|core| match core.state {
            SaveState::Init => Some(SaveState::LoadingStarted),
            SaveState::LoadingStarted => {
                retry = true;
                None
            }
            _ => None,
        });

        if transitioned.is_none() && !retry {
            warn!(
                "Save data already loaded for slot '{}', ignoring initialize",
                self.inner.config.slot_name
            );
            return false;
        }

        if retry {
            info!(
                "Retrying load of slot '{}' for user {}",
                self.inner.config.slot_name,
                player.user_index()
            );
        }

        let weak = Arc::downgrade(&self.inner);
        persistence::load_or_create(
            self.inner.config.handle_kind,
            OwnerContext::new(&player),
            &self.inner.config.slot_name,
            Arc::clone(&self.inner.backend),
            &self.inner.runtime,
            move |loaded| match weak.upgrade() {
                Some(inner) => inner.on_save_loaded(loaded),
                None => debug!("Save orchestrator dropped before load completed"),
            },
        );

        true
    }

    /// Save the player's progress.
    ///
    /// See [`SaveOrchestrator::request_save_with`].
    pub fn request_save(&self) -> bool {
        self.request_save_with(|_| {})
    }

    /// Save the player's progress and report the outcome to `on_complete`.
    ///
    /// Returns `false` and leaves the state untouched when no save is loaded,
    /// when the save's player is gone, when its slot name is empty, or when
    /// overlapping saves are disabled and one is still running. Otherwise
    /// moves to [`SaveState::SaveStarted`] and schedules the commit; the state
    /// moves to [`SaveState::Saved`] when it finishes, whether it succeeded or
    /// not. Only `on_complete` learns whether the write succeeded.
    pub fn request_save_with<F>(&self, on_complete: F) -> bool
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let Some(handle) = self.current_handle() else {
            debug!("Save requested before save data was loaded, ignoring");
            return false;
        };

        let exclusive = !self.inner.config.allow_overlapping_saves;
        let prepared = match handle.prepare_commit(exclusive) {
            Ok(prepared) => prepared,
            Err(CommitRejection::SaveInProgress) => {
                warn!(
                    "Save requested for slot '{}' while another save is in progress, ignoring",
                    handle.slot_name()
                );
                return false;
            }
            Err(rejection) => {
                error!(
                    "Save requested for slot '{}' but {}",
                    handle.slot_name(),
                    rejection
                );
                return false;
            }
        };

        let token = self.inner.save_requests.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.transition(|_| Some(SaveState::SaveStarted));

        let weak = Arc::downgrade(&self.inner);
        handle.schedule_commit(prepared, move |outcome| {
            match weak.upgrade() {
                Some(inner) => inner.on_game_saved(token, &outcome),
                None => debug!("Save orchestrator dropped before save {} completed", token),
            }
            on_complete(outcome.success);
        });

        true
    }

    pub fn current_state(&self) -> SaveState {
        self.inner.lock_core().state
    }

    /// The loaded save, `None` until the first load succeeds
    pub fn current_handle(&self) -> Option<Arc<SaveDataHandle>> {
        self.inner.lock_core().current_handle.clone()
    }

    /// Register a listener and immediately call it with the current state.
    ///
    /// The listener then hears every later transition, in subscription order
    /// relative to the other listeners.
    pub fn subscribe<L>(&self, listener: L) -> SubscriptionId
    where
        L: SaveStateListener + 'static,
    {
        let listener: Arc<dyn SaveStateListener> = Arc::new(listener);

        // No transition may be published between registering and replaying
        let _notify = self.inner.lock_notify();
        let (id, state) = {
            let mut core = self.inner.lock_core();
            let id = core.subscribers.add(Arc::clone(&listener));
            (id, core.state)
        };

        debug!("Subscribed {} at state {}", id, state);
        listener.on_state_changed(state);
        id
    }

    /// Remove a listener. Returns whether it was subscribed; unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.lock_core().subscribers.remove(id);
        if removed {
            debug!("Unsubscribed {}", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock_core().subscribers.len()
    }

    /// Receiver that follows the state, for tasks that want to await a state
    pub fn state_watch(&self) -> watch::Receiver<SaveState> {
        self.inner.state_tx.subscribe()
    }

    /// Number of saves accepted so far
    pub fn save_request_count(&self) -> u64 {
        self.inner.save_requests.load(Ordering::SeqCst)
    }

    /// Whether the loaded save has a commit that has not reported back
    pub fn is_save_in_progress(&self) -> bool {
        self.current_handle()
            .is_some_and(|handle| handle.is_save_in_progress())
    }
}

impl OrchestratorInner {
    fn lock_core(&self) -> MutexGuard<'_, OrchestratorCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_notify(&self) -> MutexGuard<'_, ()> {
        self.notify.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a transition chosen by `decide` and notify listeners.
    ///
    /// `decide` runs under the core lock and may update the core; returning
    /// `None` leaves the state alone. Listeners are called after the core lock
    /// is released but before the notify lock is, so transitions reach
    /// listeners and the watch channel in the order they were applied.
    fn transition<F>(&self, decide: F) -> Option<SaveState>
    where
        F: FnOnce(&mut OrchestratorCore) -> Option<SaveState>,
    {
        let _notify = self.lock_notify();
        let (previous, next, listeners) = {
            let mut core = self.lock_core();
            let next = decide(&mut core)?;
            let previous = core.state;
            core.state = next;
            (previous, next, core.subscribers.snapshot())
        };

        if previous.is_valid_transition(next) {
            debug!("Save state {} -> {}", previous, next);
        } else {
            warn!(
                "Save state {} -> {} is outside the save cycle, saves are overlapping",
                previous, next
            );
        }

        for listener in listeners {
            listener.on_state_changed(next);
        }
        self.state_tx.send_replace(next);

        Some(next)
    }

    fn on_save_loaded(&self, loaded: Option<Arc<SaveDataHandle>>) {
        let Some(handle) = loaded else {
            warn!(
                "No save data returned for slot '{}', staying in {}",
                self.config.slot_name,
                SaveState::LoadingStarted
            );
            return;
        };

        if handle.kind() != self.config.handle_kind {
            warn!(
                "Loaded {} save for slot '{}' but {} was expected, staying in {}",
                handle.kind(),
                handle.slot_name(),
                self.config.handle_kind,
                SaveState::LoadingStarted
            );
            return;
        }

        let accepted = self.transition(|core| {
            if core.state != SaveState::LoadingStarted {
                return None;
            }
            core.current_handle = Some(Arc::clone(&handle));
            Some(SaveState::Loaded)
        });

        if accepted.is_none() {
            debug!(
                "Discarding late load of slot '{}', a save is already loaded",
                handle.slot_name()
            );
        }
    }

    fn on_game_saved(&self, token: u64, outcome: &CommitOutcome) {
        if outcome.success {
            info!(
                "Save {} of slot '{}' completed (request {})",
                token, outcome.slot_name, outcome.request
            );
        } else {
            warn!(
                "Save {} of slot '{}' failed (request {})",
                token, outcome.slot_name, outcome.request
            );
        }

        self.transition(|_| Some(SaveState::Saved));
    }
}

impl fmt::Debug for SaveOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.lock_core();
        f.debug_struct("SaveOrchestrator")
            .field("slot_name", &self.inner.config.slot_name)
            .field("handle_kind", &self.inner.config.handle_kind)
            .field("state", &core.state)
            .field("current_handle", &core.current_handle)
            .field("subscribers", &core.subscribers)
            .finish()
    }
}
