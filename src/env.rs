//! Environment constants and path utilities for the save system.
//!
//! This module centralizes the slot names, file extensions and directory names
//! used by the save backends, making them easier to maintain and modify.

use std::path::{Path, PathBuf};

/// Slot name used when the configuration does not name one
pub const DEFAULT_SAVE_NAME: &str = "DefaultSaveGame";

/// Directory name used under the system temp dir when no save directory is configured
pub const SAVE_DIR_NAME: &str = "player-save";

/// Save file related names
pub mod save {
    /// Extension of persisted save files
    pub const SAVE_FILE_EXTENSION: &str = "sav";

    /// Prefix of in-flight temporary files
    pub const TEMP_FILE_PREFIX: &str = ".tmp_";

    /// Version of the save file envelope
    pub const FORMAT_VERSION: u32 = 1;
}

/// Test-related constants
pub mod test {
    /// Player name used by tests
    pub const TEST_PLAYER_NAME: &str = "test-player";

    /// Slot name used by tests that do not exercise the default
    pub const TEST_SLOT_NAME: &str = "TestSlot";
}

/// Default save directory when none is configured
pub fn default_save_dir() -> PathBuf {
    std::env::temp_dir().join(SAVE_DIR_NAME)
}

/// File name of a slot for a given user, e.g. `DefaultSaveGame_0.sav`
pub fn slot_file_name(slot_name: &str, user_index: i32) -> String {
    format!("{}_{}.{}", slot_name, user_index, save::SAVE_FILE_EXTENSION)
}

/// Build the save file path for a slot
pub fn slot_file_path(save_dir: &Path, slot_name: &str, user_index: i32) -> PathBuf {
    save_dir.join(slot_file_name(slot_name, user_index))
}

/// Build a unique temporary file path inside the save directory
pub fn temp_file_path(save_dir: &Path, slot_name: &str) -> PathBuf {
    save_dir.join(format!(
        "{}{}_{}",
        save::TEMP_FILE_PREFIX,
        slot_name,
        uuid::Uuid::new_v4()
    ))
}
