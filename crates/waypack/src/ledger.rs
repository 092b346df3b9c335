//! # Download Ledger
//!
//! Durable record of explicitly downloaded packs: one JSON document
//! mapping pack id to its download timestamp. The ledger is the source
//! of truth for "is this downloaded" across sessions; every mutation is
//! persisted before the operation reports success.
//!
//! I/O is synchronous-but-fallible on purpose. The document is tiny,
//! and doing the write inline makes the ledger the single serialization
//! point of a logical download/remove operation.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};

/// File name of the ledger document under the engine data directory.
pub const LEDGER_FILE: &str = "downloads.v1.json";

/// One downloaded pack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    pub id: String,
    pub downloaded_at: DateTime<Utc>,
}

impl DownloadRecord {
    pub fn now(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            downloaded_at: Utc::now(),
        }
    }
}

/// On-disk shape: `{ "downloaded": { "<id>": { "id", "downloadedAt" } } }`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerDocument {
    #[serde(default)]
    downloaded: HashMap<String, DownloadRecord>,
}

/// Durable download ledger.
pub struct DownloadLedger {
    path: PathBuf,
    state: RwLock<HashMap<String, DownloadRecord>>,
}

impl DownloadLedger {
    /// Open the ledger at `path`. A missing or unreadable document is
    /// treated as an empty ledger rather than an error, so a corrupted
    /// file degrades to "nothing downloaded" instead of a broken app.
    pub fn open(path: PathBuf) -> EngineResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let state = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<LedgerDocument>(&bytes) {
                Ok(document) => document.downloaded,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Ledger document unparsable, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = ?path, error = %e, "Ledger document unreadable, starting empty");
                HashMap::new()
            }
        };

        debug!(path = ?path, entries = state.len(), "Ledger opened");
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<DownloadRecord> {
        self.state.read().get(id).cloned()
    }

    /// Insert (or replace) a record and persist. The in-memory map is
    /// rolled back when the persist fails, so the ledger never claims a
    /// download that was not durably recorded.
    pub fn insert(&self, record: DownloadRecord) -> EngineResult<()> {
        let mut state = self.state.write();
        let previous = state.insert(record.id.clone(), record.clone());

        if let Err(e) = Self::persist(&self.path, &state) {
            match previous {
                Some(previous) => {
                    state.insert(record.id.clone(), previous);
                }
                None => {
                    state.remove(&record.id);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Remove a record and persist. Removing an id that was never
    /// downloaded is a no-op and skips the disk write entirely.
    pub fn remove(&self, id: &str) -> EngineResult<bool> {
        let mut state = self.state.write();
        let Some(previous) = state.remove(id) else {
            return Ok(false);
        };

        if let Err(e) = Self::persist(&self.path, &state) {
            state.insert(id.to_string(), previous);
            return Err(e);
        }
        Ok(true)
    }

    /// All records, most recently downloaded first.
    pub fn records(&self) -> Vec<DownloadRecord> {
        let mut records: Vec<DownloadRecord> = self.state.read().values().cloned().collect();
        records.sort_by(|a, b| {
            b.downloaded_at
                .cmp(&a.downloaded_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        records
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    fn persist(path: &PathBuf, state: &HashMap<String, DownloadRecord>) -> EngineResult<()> {
        let document = LedgerDocument {
            downloaded: state.clone(),
        };
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| EngineError::Ledger(format!("failed to serialize ledger: {e}")))?;

        // Temp file plus rename keeps the document whole under crashes.
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &json)?;
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(EngineError::Storage(e));
        }
        Ok(())
    }
}
