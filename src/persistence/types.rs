use crate::env;
use crate::save::record::{SaveHandleKind, SaveRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors raised by save backends
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// I/O error from the storage medium
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Save file could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored checksum does not match the stored data
    #[error("Checksum validation failed for {0}")]
    ChecksumMismatch(String),

    /// File starts like a save file but its header cannot be used
    #[error("Corrupt save header: {0}")]
    CorruptHeader(String),

    /// Slot name cannot address a storage location
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    /// Backend-specific failure
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Storage address of one player's save: slot name plus platform user index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub slot_name: String,
    pub user_index: i32,
}

impl SlotKey {
    pub fn new(slot_name: impl Into<String>, user_index: i32) -> Self {
        Self {
            slot_name: slot_name.into(),
            user_index,
        }
    }

    /// Reject slot names that are empty or would escape the storage root
    pub fn validate(&self) -> Result<(), PersistenceError> {
        if self.slot_name.is_empty() {
            return Err(PersistenceError::InvalidSlot("empty slot name".to_string()));
        }

        if self
            .slot_name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control())
            || self.slot_name.starts_with('.')
        {
            return Err(PersistenceError::InvalidSlot(self.slot_name.clone()));
        }

        Ok(())
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.slot_name, self.user_index)
    }
}

/// Envelope persisted by the backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    pub format_version: u32,
    pub kind: SaveHandleKind,
    pub slot_name: String,
    pub user_index: i32,
    pub record: SaveRecord,
}

impl SaveFile {
    pub fn new(kind: SaveHandleKind, slot: &SlotKey, record: SaveRecord) -> Self {
        Self {
            format_version: env::save::FORMAT_VERSION,
            kind,
            slot_name: slot.slot_name.clone(),
            user_index: slot.user_index,
            record,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistenceError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
