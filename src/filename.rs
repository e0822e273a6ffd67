//! Backup filename encoding and decoding.
//!
//! A logger writing to `app.log` names its backups `app-<unix_seconds>.log`,
//! with `.gz` appended once the mill has compressed one. [`BackupPattern`]
//! captures the prefix/extension split of the active path and is the single
//! authority on which directory entries belong to the logger: anything it
//! cannot decode is foreign and left alone.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Suffix appended to a backup once it has been gzip-compressed.
pub(crate) const COMPRESS_SUFFIX: &str = ".gz";

/// Decoded identity of a backup filename.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct ParsedName {
    /// Rotation instant encoded in the name, at one-second resolution.
    pub(crate) timestamp: SystemTime,
    /// Whether the name carries the [`COMPRESS_SUFFIX`].
    pub(crate) compressed: bool,
}

/// Prefix/extension split of the active log path.
///
/// For `/var/log/myfoo/foo.log` the prefix is `foo-` and the extension is
/// `.log`; an extensionless path yields an empty extension and both encoding
/// and decoding remain well-defined.
#[derive(Clone, Debug)]
pub(crate) struct BackupPattern {
    prefix: String,
    ext: String,
}

impl BackupPattern {
    /// Derives the pattern from the active log path.
    pub(crate) fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (stem, ext) = match name.rfind('.') {
            Some(index) => {
                let (stem, ext) = name.split_at(index);
                (stem.to_owned(), ext.to_owned())
            }
            None => (name, String::new()),
        };
        Self {
            prefix: format!("{stem}-"),
            ext,
        }
    }

    /// Formats the backup filename for a rotation at `timestamp`.
    ///
    /// The instant is truncated to whole seconds since the Unix epoch, so
    /// back-to-back rotations within one second reuse the same name and the
    /// later rename overwrites the earlier backup.
    pub(crate) fn backup_name(&self, timestamp: SystemTime) -> String {
        let seconds = timestamp
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        format!("{}{}{}", self.prefix, seconds, self.ext)
    }

    /// Decodes a directory entry name.
    ///
    /// Tries the uncompressed form first, then retries with the
    /// [`COMPRESS_SUFFIX`] stripped. Returns `None` for anything that does
    /// not belong to this logger, including the active file itself.
    pub(crate) fn parse(&self, name: &str) -> Option<ParsedName> {
        if let Some(timestamp) = self.parse_backup(name) {
            return Some(ParsedName {
                timestamp,
                compressed: false,
            });
        }
        let stem = name.strip_suffix(COMPRESS_SUFFIX)?;
        let timestamp = self.parse_backup(stem)?;
        Some(ParsedName {
            timestamp,
            compressed: true,
        })
    }

    fn parse_backup(&self, name: &str) -> Option<SystemTime> {
        let middle = name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.ext.as_str())?;
        if middle.is_empty() || !middle.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        let seconds = middle.parse::<u64>().ok()?;
        Some(UNIX_EPOCH + Duration::from_secs(seconds))
    }
}
