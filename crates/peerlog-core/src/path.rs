//! Record path derivation: `<output>/<filetype>/<filename>/<peer_id>.json`.

use std::path::{Component, Path, PathBuf};

use crate::content::FileMetadata;

/// A metadata field that is not a relative path, or a peer ID that is not a
/// single plain path segment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} {value:?} is not a safe relative path")]
pub struct PathError {
    pub field: &'static str,
    pub value: String,
}

/// Directory holding every peer record for one file.
///
/// Either field may span several directories (`music/song.mp3`), but must
/// stay below `output_dir`.
pub fn record_dir(output_dir: &Path, meta: &FileMetadata) -> Result<PathBuf, PathError> {
    let mut dir = output_dir.to_path_buf();
    push_relative(&mut dir, "filetype", &meta.file_type)?;
    push_relative(&mut dir, "filename", &meta.file_name)?;
    Ok(dir)
}

/// Record file for `peer_id` inside `dir`.
pub fn record_file(dir: &Path, peer_id: &str) -> Result<PathBuf, PathError> {
    let peer = segment("peer id", peer_id)?;
    Ok(dir.join(format!("{peer}.json")))
}

fn push_relative(dir: &mut PathBuf, field: &'static str, value: &str) -> Result<(), PathError> {
    let err = || PathError {
        field,
        value: value.to_string(),
    };
    let mut pushed = 0;
    for component in Path::new(value).components() {
        match component {
            Component::Normal(part) => {
                dir.push(part);
                pushed += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(err())
            }
        }
    }
    if pushed == 0 {
        return Err(err());
    }
    Ok(())
}

fn segment<'a>(field: &'static str, value: &'a str) -> Result<&'a str, PathError> {
    let separator = value.contains(|c: char| c == '/' || c == '\\');
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !separator => Ok(value),
        _ => Err(PathError {
            field,
            value: value.to_string(),
        }),
    }
}
