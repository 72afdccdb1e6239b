//! Durable player state keyed by the opaque player key.
//!
//! One JSON file shared by every room. Saves merge partial fields into an
//! in-memory map and signal a debounced flusher task; the flush writes a
//! temp file and renames it over the target, so a crash mid-write never
//! corrupts the last-known-good file. Nothing here runs on the tick path.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::util::now_ms;

/// Debounce window between a save request and the flush to disk.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(1500);

const STATE_FILE: &str = "world_state.json";

/// Stored fields for one player key. Every field is optional so a partial
/// update can be merged over what is already on record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    #[serde(rename = "roomId", skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<u64>,
}

impl PlayerRecord {
    /// Fields set in `update` overwrite; absent fields keep their value.
    pub fn merge(&mut self, update: PlayerRecord) {
        if let Some(v) = update.room_id {
            self.room_id = Some(v);
        }
        if let Some(v) = update.name {
            self.name = Some(v);
        }
        if let Some(v) = update.color {
            self.color = Some(v);
        }
        if let Some(v) = update.x {
            self.x = Some(v);
        }
        if let Some(v) = update.y {
            self.y = Some(v);
        }
        if let Some(v) = update.ts {
            self.ts = Some(v);
        }
    }

    /// Partial update carrying only a new position.
    pub fn position_update(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ts: Some(now_ms()),
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to write state file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// File-backed player store with debounced saves.
#[derive(Debug)]
pub struct PlayerStore {
    path: PathBuf,
    records: Mutex<HashMap<String, PlayerRecord>>,
    flush_signal: mpsc::UnboundedSender<()>,
}

impl PlayerStore {
    /// Open the store under `data_dir`, loading any existing state file, and
    /// start its flusher task. A file that fails to parse is renamed aside
    /// and the store starts empty.
    pub fn open(data_dir: &Path) -> Arc<Self> {
        if let Err(e) = fs::create_dir_all(data_dir) {
            warn!("could not create data dir {}: {e}", data_dir.display());
        }
        let path = data_dir.join(STATE_FILE);

        let records = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, PlayerRecord>>(&raw) {
                Ok(map) => {
                    info!("loaded {} persisted players", map.len());
                    map
                }
                Err(e) => {
                    warn!("state file unreadable, starting empty: {e}");
                    let quarantine = PathBuf::from(format!("{}.bad.{}", path.display(), now_ms()));
                    if let Err(e) = fs::rename(&path, &quarantine) {
                        warn!("could not quarantine bad state file: {e}");
                    }
                    HashMap::new()
                }
            },
            // Missing file is a fresh install.
            Err(_) => HashMap::new(),
        };

        let (flush_signal, mut flush_requests) = mpsc::unbounded_channel();
        let store = Arc::new(Self {
            path,
            records: Mutex::new(records),
            flush_signal,
        });

        // Debounced flusher: the first signal opens the window, signals
        // arriving during the window coalesce into one write. Holding only a
        // weak handle lets the store drop when its last user does.
        let weak = Arc::downgrade(&store);
        tokio::spawn(async move {
            while flush_requests.recv().await.is_some() {
                tokio::time::sleep(SAVE_DEBOUNCE).await;
                while flush_requests.try_recv().is_ok() {}
                let Some(store) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = store.flush() {
                    warn!("state flush failed: {e}");
                }
            }
        });

        store
    }

    pub fn load(&self, key: &str) -> Option<PlayerRecord> {
        self.records.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Merge a partial update and schedule a debounced flush.
    pub fn save(&self, key: &str, update: PlayerRecord) {
        {
            let mut records = self.records.lock();
            records.entry(key.to_owned()).or_default().merge(update);
        }
        let _ = self.flush_signal.send(());
    }

    /// Write the full map through a temp file and atomic rename.
    pub fn flush(&self) -> Result<(), PersistError> {
        let encoded = {
            let records = self.records.lock();
            serde_json::to_vec_pretty(&*records)?
        };
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &encoded)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
