use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::error::{PlaylistError, Result};

pub const MANIFEST_EXTENSION: &str = "m3u8";

/// Display format of a manifest's modification time.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub path: PathBuf,
    pub modified: DateTime<Local>,
}

impl ManifestEntry {
    pub fn modified_display(&self) -> String {
        self.modified.format(DATE_FORMAT).to_string()
    }
}

/// Manifests directly inside `dir`, most recently modified first.
pub fn list_manifests(dir: &Path) -> Result<Vec<ManifestEntry>> {
    if !dir.is_dir() {
        return Err(PlaylistError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(MANIFEST_EXTENSION) {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
            debug!(path = %path.display(), "skipping non UTF-8 file name");
            continue;
        };
        entries.push(ManifestEntry {
            name,
            path,
            modified: DateTime::<Local>::from(metadata.modified()?),
        });
    }

    entries.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(entries)
}
