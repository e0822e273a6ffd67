//! Directory scanning for existing backups.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::ScanError;
use crate::filename::BackupPattern;

/// A backup file discovered in the log directory.
#[derive(Clone, Debug)]
pub(crate) struct Segment {
    /// Full path of the backup file.
    pub(crate) path: PathBuf,
    /// Rotation instant decoded from the filename.
    pub(crate) timestamp: SystemTime,
    /// File size in bytes.
    pub(crate) size: u64,
    /// Whether the backup has already been gzip-compressed.
    pub(crate) compressed: bool,
}

/// Lists the backups belonging to `pattern` inside `directory`.
///
/// The active file and foreign entries decode as nothing and are skipped, as
/// are entries whose metadata cannot be read. The result is sorted newest
/// first; a compressed backup sorts before an uncompressed one carrying the
/// same timestamp, which keeps the order deterministic while a compression
/// pass is mid-flight.
pub(crate) fn old_segments(
    directory: &Path,
    pattern: &BackupPattern,
) -> Result<Vec<Segment>, ScanError> {
    let entries = fs::read_dir(directory).map_err(|source| ScanError {
        directory: directory.to_path_buf(),
        source,
    })?;

    let mut segments = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ScanError {
            directory: directory.to_path_buf(),
            source,
        })?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(parsed) = pattern.parse(name) else {
            continue;
        };
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        segments.push(Segment {
            path: entry.path(),
            timestamp: parsed.timestamp,
            size: metadata.len(),
            compressed: parsed.compressed,
        });
    }

    segments.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.compressed.cmp(&a.compressed))
    });
    Ok(segments)
}
