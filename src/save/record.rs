use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Data version stamped on every record before it is written
pub const LATEST_DATA_VERSION: u32 = 1;

/// Closed set of save handle variants.
///
/// The variant is chosen by configuration and resolved once when the
/// orchestrator is built. It decides what the pre-save hook refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveHandleKind {
    /// Base variant: only the data version is refreshed before a save
    #[default]
    Standard,
    /// Also stamps the save time and counts saves
    Timestamped,
}

impl SaveHandleKind {
    /// Build the default record for a freshly created save
    pub fn new_record(self) -> SaveRecord {
        SaveRecord::default()
    }

    /// Pre-save hook, run synchronously right before a commit is scheduled
    pub fn prepare_for_save(self, record: &mut SaveRecord) {
        record.data_version = LATEST_DATA_VERSION;

        if let SaveHandleKind::Timestamped = self {
            record.last_saved_at = Some(Utc::now());
            record.save_count += 1;
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SaveHandleKind::Standard => "standard",
            SaveHandleKind::Timestamped => "timestamped",
        }
    }
}

impl fmt::Display for SaveHandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload carried by a save handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub data_version: u32,
    pub created_at: DateTime<Utc>,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub save_count: u64,
    /// Game data, keyed by the game's own property names
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl Default for SaveRecord {
    fn default() -> Self {
        Self {
            data_version: LATEST_DATA_VERSION,
            created_at: Utc::now(),
            last_saved_at: None,
            save_count: 0,
            properties: BTreeMap::new(),
        }
    }
}
