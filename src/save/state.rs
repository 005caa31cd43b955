use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the player's save data.
///
/// States are ordered by occurrence: a session starts in [`SaveState::Init`],
/// moves to [`SaveState::Loaded`] once, and then alternates between
/// [`SaveState::SaveStarted`] and [`SaveState::Saved`] for every save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SaveState {
    #[default]
    Init,
    LoadingStarted,
    Loaded,
    SaveStarted,
    Saved,
}

impl SaveState {
    /// Whether `self -> next` is an edge of the save state machine.
    ///
    /// ```text
    /// Init           -> LoadingStarted
    /// LoadingStarted -> Loaded
    /// Loaded         -> SaveStarted
    /// Saved          -> SaveStarted
    /// SaveStarted    -> Saved
    /// ```
    pub fn is_valid_transition(self, next: SaveState) -> bool {
        use SaveState::*;
        matches!(
            (self, next),
            (Init, LoadingStarted)
                | (LoadingStarted, Loaded)
                | (Loaded, SaveStarted)
                | (Saved, SaveStarted)
                | (SaveStarted, Saved)
        )
    }

    /// True once save data has been loaded at least once
    pub fn has_loaded(self) -> bool {
        matches!(
            self,
            SaveState::Loaded | SaveState::SaveStarted | SaveState::Saved
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SaveState::Init => "init",
            SaveState::LoadingStarted => "loading_started",
            SaveState::Loaded => "loaded",
            SaveState::SaveStarted => "save_started",
            SaveState::Saved => "saved",
        }
    }
}

impl fmt::Display for SaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
