//! On-disk peer records.
//!
//! One JSON file per peer per file:
//!   {output}/{filetype}/{filename}/{peer_id}.json
//!
//! Writes are atomic (temp file → fsync → rename), so a crash never leaves a
//! torn record. Callers must not run two merges for the same path at once;
//! the ingest pipeline guarantees a single writer per path.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use peerlog_core::path::{record_file, PathError};
use peerlog_core::record::{PeerAddressInfo, PeerRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("failed to create {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write {0}: {1}")]
    Write(PathBuf, std::io::Error),
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    quarantine_corrupt: bool,
}

impl RecordStore {
    pub fn new(quarantine_corrupt: bool) -> Self {
        Self { quarantine_corrupt }
    }

    /// Merge `fresh` into the record under `dir` and write it back.
    ///
    /// An unreadable or corrupt existing record is treated as absent.
    pub fn merge_and_persist(
        &self,
        dir: &Path,
        fresh: PeerAddressInfo,
    ) -> Result<PeerRecord, StoreError> {
        let path = record_file(dir, &fresh.id)?;
        fs::create_dir_all(dir).map_err(|e| StoreError::CreateDir(dir.to_path_buf(), e))?;

        let existing = self.load_existing(&path);
        let merged = PeerRecord::merge(existing, fresh, chrono::Local::now().to_rfc3339());

        let bytes = serde_json::to_vec_pretty(&merged)?;
        write_atomic(&path, &bytes)?;

        tracing::info!(
            peer = %merged.id,
            addrs = merged.addrs.len(),
            sightings = merged.accessed_time.len(),
            path = %path.display(),
            "peer record saved"
        );
        Ok(merged)
    }

    fn load_existing(&self, path: &Path) -> Option<PeerRecord> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    "failed to read existing record, replacing it"
                );
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "existing record is corrupt");
                if self.quarantine_corrupt {
                    quarantine(path);
                }
                None
            }
        }
    }
}

/// Move a corrupt record aside so the next write does not destroy it.
fn quarantine(path: &Path) {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".corrupt-{stamp}"));
    let target = PathBuf::from(name);

    match fs::rename(path, &target) {
        Ok(()) => tracing::warn!(path = %target.display(), "corrupt record quarantined"),
        Err(e) => tracing::warn!(
            error = %e,
            path = %path.display(),
            "failed to quarantine corrupt record"
        ),
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp_path = PathBuf::from(tmp);

    let written = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    written.map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::Write(path.to_path_buf(), e)
    })
}
