//! # Player Save
//!
//! Save-state orchestration for a single player's persisted save data. The
//! crate loads-or-creates the save at session start, commits it in the
//! background on demand, and broadcasts every lifecycle transition to
//! listeners.
//!
//! ## Architecture Overview
//!
//! - **[`save`]**: the [`SaveOrchestrator`] state machine, the
//!   [`SaveDataHandle`] it owns, and the listener registry
//! - **[`persistence`]**: the [`SaveBackend`] storage contract with file and
//!   in-memory implementations
//! - **[`config`]**: TOML-backed [`SaveSystemConfig`]
//!
//! ## Save states
//!
//! ```text
//! Init -> LoadingStarted -> Loaded -> SaveStarted -> Saved
//!                                          ^            |
//!                                          +------------+
//! ```
//!
//! A listener that subscribes late is called right away with the current
//! state, so it never misses where the save currently is.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use player_save::{FileBackend, LocalPlayer, SaveOrchestrator, SaveState, SaveSystemConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     player_save::logging::init(None);
//!
//!     let config = SaveSystemConfig::default();
//!     let backend = Arc::new(FileBackend::from_config(&config)?);
//!     let orchestrator = SaveOrchestrator::new(config, backend)?;
//!
//!     orchestrator.subscribe(|state: SaveState| println!("save state: {}", state));
//!
//!     let player = Arc::new(LocalPlayer::new(0, "player one"));
//!     orchestrator.initialize(Some(Arc::clone(&player)));
//!
//!     let mut states = orchestrator.state_watch();
//!     states.wait_for(|state| *state == SaveState::Loaded).await?;
//!
//!     if let Some(save) = orchestrator.current_handle() {
//!         save.set_property("level", 3);
//!     }
//!     orchestrator.request_save();
//!     states.wait_for(|state| *state == SaveState::Saved).await?;
//!     Ok(())
//! }
//! ```

/// Save state machine, save handles and state listeners.
pub mod save;

/// Storage backends and the load-or-create entry point.
pub mod persistence;

/// Save system configuration.
pub mod config;

/// Slot names, file names and path utilities.
pub mod env;

/// Tracing subscriber setup.
pub mod logging;

pub use config::SaveSystemConfig;
pub use env::DEFAULT_SAVE_NAME;
pub use persistence::{
    FileBackend, FileBackendConfig, MemoryBackend, PersistenceError, SaveBackend, SaveFile,
    SlotKey,
};
pub use save::{
    CommitOutcome, CommitRejection, LocalPlayer, LoggingStateListener, OwnerContext,
    SaveDataHandle, SaveError, SaveHandleKind, SaveOrchestrator, SaveRecord, SaveState,
    SaveStateListener, SubscriptionId,
};
