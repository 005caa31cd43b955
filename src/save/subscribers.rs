use crate::save::state::SaveState;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Observer of save state transitions.
///
/// Listeners are called synchronously on whatever context performed the
/// transition, one transition at a time. They may read the orchestrator's
/// state but must not initialize, save or subscribe from inside the call.
pub trait SaveStateListener: Send + Sync {
    fn on_state_changed(&self, state: SaveState);
}

impl<F> SaveStateListener for F
where
    F: Fn(SaveState) + Send + Sync,
{
    fn on_state_changed(&self, state: SaveState) {
        self(state)
    }
}

/// Listener that logs every state it is told about
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingStateListener;

impl SaveStateListener for LoggingStateListener {
    fn on_state_changed(&self, state: SaveState) {
        info!("Save state: {}", state);
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
///
/// Ids are unique within the process, so an id issued by one orchestrator
/// never matches a listener of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Ordered set of listeners.
///
/// Ids come from a monotonic counter, so iterating the map visits listeners
/// in the order they subscribed.
#[derive(Default)]
pub struct SubscriberList {
    listeners: BTreeMap<SubscriptionId, Arc<dyn SaveStateListener>>,
}

impl SubscriberList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Arc<dyn SaveStateListener>) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.listeners.insert(id, listener);
        id
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.listeners.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Listeners in notification order, detached from the list so they can
    /// be called without holding the orchestrator's lock
    pub fn snapshot(&self) -> Vec<Arc<dyn SaveStateListener>> {
        self.listeners.values().cloned().collect()
    }
}

impl fmt::Debug for SubscriberList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberList")
            .field("ids", &self.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}
