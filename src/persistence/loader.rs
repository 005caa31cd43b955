use crate::persistence::backend::SaveBackend;
use crate::persistence::types::{SaveFile, SlotKey};
use crate::save::handle::SaveDataHandle;
use crate::save::owner::OwnerContext;
use crate::save::record::SaveHandleKind;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

/// Load the save stored in a slot, or create a fresh one, in the background.
///
/// `on_loaded` runs on a runtime worker with:
/// - the stored save, keeping whatever kind it was written as, or
/// - a fresh save of `kind` when the slot is empty or its contents cannot be
///   decoded, or
/// - `None` when the backend itself fails to read the slot.
pub fn load_or_create<F>(
    kind: SaveHandleKind,
    owner: OwnerContext,
    slot_name: &str,
    backend: Arc<dyn SaveBackend>,
    runtime: &Handle,
    on_loaded: F,
) where
    F: FnOnce(Option<Arc<SaveDataHandle>>) + Send + 'static,
{
    let slot = SlotKey::new(slot_name, owner.user_index());
    let task_runtime = runtime.clone();

    runtime.spawn(async move {
        let read = backend.read(&slot).await;

        let loaded = match read {
            Ok(Some(bytes)) => match SaveFile::from_bytes(&bytes) {
                Ok(save_file) => {
                    info!(
                        "Loaded {} save from slot {} ({} bytes)",
                        save_file.kind,
                        slot,
                        bytes.len()
                    );
                    Some(SaveDataHandle::from_save_file(
                        save_file,
                        slot.slot_name.clone(),
                        owner,
                        backend,
                        task_runtime,
                    ))
                }
                Err(e) => {
                    warn!(
                        "Save in slot {} could not be decoded, starting fresh: {}",
                        slot, e
                    );
                    Some(SaveDataHandle::create(
                        kind,
                        slot.slot_name.clone(),
                        owner,
                        backend,
                        task_runtime,
                    ))
                }
            },
            Ok(None) => {
                info!("No save in slot {}, creating new {} save", slot, kind);
                Some(SaveDataHandle::create(
                    kind,
                    slot.slot_name.clone(),
                    owner,
                    backend,
                    task_runtime,
                ))
            }
            Err(e) => {
                error!(
                    "Failed to read slot {} from {} backend: {}",
                    slot,
                    backend.backend_name(),
                    e
                );
                None
            }
        };

        on_loaded(loaded);
    });
}
