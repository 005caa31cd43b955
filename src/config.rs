//! Save system configuration
//!
//! The configuration selects the slot the player's data lives in, the save
//! handle variant, and how the file backend stores data. It is usually loaded
//! from a TOML file shipped with the game:
//!
//! ```toml
//! slot_name = "DefaultSaveGame"
//! handle_kind = "timestamped"
//! save_directory = "/home/player/.local/share/game/saves"
//! compress = true
//! ```
//!
//! Missing keys fall back to their defaults.

use crate::env;
use crate::persistence::SlotKey;
use crate::save::{SaveError, SaveHandleKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveSystemConfig {
    /// Slot the orchestrator loads from and saves to
    pub slot_name: String,
    /// Save handle variant, resolved once when the orchestrator is built
    pub handle_kind: SaveHandleKind,
    /// Root directory of the file backend
    pub save_directory: PathBuf,
    /// Gzip save files written by the file backend
    pub compress: bool,
    /// Verify save file checksums when the file backend reads them
    pub checksum_validation: bool,
    /// Let a save start while the previous one is still being written.
    /// Overlapping saves race two writes to the same slot.
    pub allow_overlapping_saves: bool,
}

impl Default for SaveSystemConfig {
    fn default() -> Self {
        Self {
            slot_name: env::DEFAULT_SAVE_NAME.to_string(),
            handle_kind: SaveHandleKind::default(),
            save_directory: env::default_save_dir(),
            compress: false,
            checksum_validation: true,
            allow_overlapping_saves: true,
        }
    }
}

impl SaveSystemConfig {
    /// Default configuration with saves stored under `save_directory`
    pub fn with_save_directory(save_directory: impl Into<PathBuf>) -> Self {
        Self {
            save_directory: save_directory.into(),
            ..Self::default()
        }
    }

    /// Check that the configuration can address a slot
    pub fn validate(&self) -> Result<(), SaveError> {
        SlotKey::new(self.slot_name.clone(), 0)
            .validate()
            .map_err(|e| SaveError::InvalidConfig(format!("slot_name: {}", e)))
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Convert configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}
