//! Content table — the CIDs we care about and the file each one belongs to.
//!
//! Loaded once at startup from a JSON object:
//!
//! ```json
//! { "QmXyz...": { "filename": "a.txt", "filetype": "doc" } }
//! ```
//!
//! Read-only afterwards; the pipeline holds it behind an `Arc`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Declared metadata for one CID.
///
/// Keys match case-insensitively. A missing key reads as empty, which the
/// record path check later refuses for that CID alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HashMap<String, serde_json::Value>")]
pub struct FileMetadata {
    #[serde(rename = "filename")]
    pub file_name: String,
    #[serde(rename = "filetype")]
    pub file_type: String,
}

impl TryFrom<HashMap<String, serde_json::Value>> for FileMetadata {
    type Error = String;

    fn try_from(fields: HashMap<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let mut meta = FileMetadata::default();
        for (key, value) in fields {
            let slot = if key.eq_ignore_ascii_case("filename") {
                &mut meta.file_name
            } else if key.eq_ignore_ascii_case("filetype") {
                &mut meta.file_type
            } else {
                continue;
            };
            match value {
                serde_json::Value::String(v) => *slot = v,
                serde_json::Value::Null => {}
                other => return Err(format!("{key} must be a string, got {other}")),
            }
        }
        Ok(meta)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("failed to read content table {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse content table {0}: {1}")]
    ParseFailed(PathBuf, serde_json::Error),
}

#[derive(Debug, Clone, Default)]
pub struct ContentTable {
    entries: HashMap<String, FileMetadata>,
}

impl ContentTable {
    pub fn load(path: &Path) -> Result<Self, ContentError> {
        let bytes =
            std::fs::read(path).map_err(|e| ContentError::ReadFailed(path.to_path_buf(), e))?;
        let entries = serde_json::from_slice(&bytes)
            .map_err(|e| ContentError::ParseFailed(path.to_path_buf(), e))?;
        Ok(Self { entries })
    }

    pub fn get(&self, cid: &str) -> Option<&FileMetadata> {
        self.entries.get(cid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, FileMetadata)> for ContentTable {
    fn from_iter<I: IntoIterator<Item = (String, FileMetadata)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
