use std::sync::{Arc, Weak};

/// A local player the session owns.
///
/// The session keeps the only strong reference; save handles hold an
/// [`OwnerContext`] that stops being valid once the session lets go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPlayer {
    user_index: i32,
    display_name: String,
}

impl LocalPlayer {
    pub fn new(user_index: i32, display_name: impl Into<String>) -> Self {
        Self {
            user_index,
            display_name: display_name.into(),
        }
    }

    /// Platform user index the player's slots are scoped to
    pub fn user_index(&self) -> i32 {
        self.user_index
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Non-owning reference to the player a save handle belongs to
#[derive(Debug, Clone)]
pub struct OwnerContext {
    player: Weak<LocalPlayer>,
    user_index: i32,
}

impl OwnerContext {
    pub fn new(player: &Arc<LocalPlayer>) -> Self {
        Self {
            player: Arc::downgrade(player),
            user_index: player.user_index(),
        }
    }

    /// Whether the owning player is still alive
    pub fn is_valid(&self) -> bool {
        self.player.strong_count() > 0
    }

    pub fn player(&self) -> Option<Arc<LocalPlayer>> {
        self.player.upgrade()
    }

    /// User index captured when the context was created.
    /// Still readable after the player is gone.
    pub fn user_index(&self) -> i32 {
        self.user_index
    }
}
