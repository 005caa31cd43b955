use crate::config::SaveSystemConfig;
use crate::env;
use crate::persistence::backend::SaveBackend;
use crate::persistence::header::{self, Unwrapped};
use crate::persistence::types::{PersistenceError, SlotKey};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use futures::future::BoxFuture;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Options for the file backend
#[derive(Debug, Clone)]
pub struct FileBackendConfig {
    /// Gzip save files on write. Reads detect compression on their own.
    pub compress: bool,
    /// Verify the header checksum on read
    pub checksum_validation: bool,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            compress: false,
            checksum_validation: true,
        }
    }
}

/// Save backend storing one file per slot under a root directory.
///
/// Every file carries a [`header`] with the payload checksum. Writes go to a
/// temporary file that is synced and then renamed over the slot file, so a
/// crash mid-write leaves the previous save intact and concurrent writes to
/// one slot leave exactly one complete file behind.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
    config: FileBackendConfig,
}

impl FileBackend {
    /// Create a file backend, creating the root directory if needed
    pub fn new(root: impl Into<PathBuf>, config: FileBackendConfig) -> Result<Self, PersistenceError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        debug!("File backend rooted at {}", root.display());
        Ok(Self { root, config })
    }

    /// Build a file backend from the save system configuration
    pub fn from_config(config: &SaveSystemConfig) -> Result<Self, PersistenceError> {
        Self::new(
            config.save_directory.clone(),
            FileBackendConfig {
                compress: config.compress,
                checksum_validation: config.checksum_validation,
            },
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slot_path(&self, slot: &SlotKey) -> PathBuf {
        env::slot_file_path(&self.root, &slot.slot_name, slot.user_index)
    }

    /// List the slots that currently have a save file
    pub async fn list_slots(&self) -> Result<Vec<SlotKey>, PersistenceError> {
        let mut slots = Vec::new();
        let mut entries = async_fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(env::save::SAVE_FILE_EXTENSION)
            {
                continue;
            }

            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str())
                && let Some((slot_name, user_index)) = stem.rsplit_once('_')
                && let Ok(user_index) = user_index.parse::<i32>()
            {
                slots.push(SlotKey::new(slot_name, user_index));
            }
        }

        slots.sort();
        Ok(slots)
    }

    /// Compress if configured and prepend the header
    fn encode(&self, data: Vec<u8>) -> Result<Vec<u8>, PersistenceError> {
        if !self.config.compress {
            return Ok(header::wrap(&data, false));
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&data)?;
        let compressed = encoder.finish()?;
        Ok(header::wrap(&compressed, true))
    }

    fn decode(&self, path: &Path, content: &[u8]) -> Result<Vec<u8>, PersistenceError> {
        match header::unwrap(content)? {
            Unwrapped::WithHeader { header, payload } => {
                if self.config.checksum_validation && !header.verify(payload) {
                    return Err(PersistenceError::ChecksumMismatch(
                        path.display().to_string(),
                    ));
                }

                if header.is_compressed() {
                    gunzip(payload)
                } else {
                    Ok(payload.to_vec())
                }
            }
            Unwrapped::Headerless(raw) => {
                debug!("Reading headerless save file {}", path.display());
                if raw.starts_with(&GZIP_MAGIC) {
                    gunzip(raw)
                } else {
                    Ok(raw.to_vec())
                }
            }
        }
    }

    async fn write_atomically(&self, slot: &SlotKey, data: &[u8]) -> Result<(), PersistenceError> {
        let final_path = self.slot_path(slot);
        let temp_path = env::temp_file_path(&self.root, &slot.slot_name);

        let result: std::io::Result<()> = async {
            let mut file = async_fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            async_fs::rename(&temp_path, &final_path).await
        }
        .await;

        if let Err(e) = result {
            if let Err(cleanup) = async_fs::remove_file(&temp_path).await
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                warn!("Failed to remove temp file {}: {}", temp_path.display(), cleanup);
            }
            return Err(e.into());
        }

        Ok(())
    }
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>, PersistenceError> {
    let mut decoded = Vec::new();
    GzDecoder::new(data).read_to_end(&mut decoded)?;
    Ok(decoded)
}

impl SaveBackend for FileBackend {
    fn read<'a>(
        &'a self,
        slot: &'a SlotKey,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>, PersistenceError>> {
        Box::pin(async move {
            slot.validate()?;
            let path = self.slot_path(slot);

            if !async_fs::try_exists(&path).await? {
                debug!("No save file for slot {}", slot);
                return Ok(None);
            }

            let content = async_fs::read(&path).await?;
            Ok(Some(self.decode(&path, &content)?))
        })
    }

    fn write<'a>(
        &'a self,
        slot: &'a SlotKey,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<u64, PersistenceError>> {
        Box::pin(async move {
            slot.validate()?;
            let start_time = std::time::Instant::now();

            let data = self.encode(bytes)?;
            self.write_atomically(slot, &data).await?;

            info!(
                "Saved slot {}: {} bytes in {}ms",
                slot,
                data.len(),
                start_time.elapsed().as_millis()
            );
            Ok(data.len() as u64)
        })
    }

    fn delete<'a>(&'a self, slot: &'a SlotKey) -> BoxFuture<'a, Result<bool, PersistenceError>> {
        Box::pin(async move {
            slot.validate()?;
            let path = self.slot_path(slot);

            match async_fs::remove_file(&path).await {
                Ok(()) => {
                    info!("Deleted slot {}", slot);
                    Ok(true)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn exists<'a>(&'a self, slot: &'a SlotKey) -> BoxFuture<'a, Result<bool, PersistenceError>> {
        Box::pin(async move {
            slot.validate()?;
            Ok(async_fs::try_exists(self.slot_path(slot)).await?)
        })
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
