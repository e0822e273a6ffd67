//! Error types for the synchronous write/rotate path.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Composite failure of the rotation sequence.
///
/// Each variant names the step that failed and the path involved. The logger
/// remains usable after a rotation failure; the next write re-attempts the
/// lazy open.
#[derive(Debug, Error)]
pub enum RotateError {
    /// Flushing or closing the active file failed.
    #[error("failed to close active log file {path:?}: {source}")]
    Close {
        /// Path of the active log file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Renaming the active file to its backup name failed.
    #[error("failed to move {path:?} aside to {backup:?}: {source}")]
    Rename {
        /// Path of the active log file.
        path: PathBuf,
        /// Backup path the rename targeted.
        backup: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Opening a fresh active file failed.
    #[error("failed to open fresh log file {path:?}: {source}")]
    Open {
        /// Path of the active log file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

impl From<RotateError> for io::Error {
    fn from(error: RotateError) -> Self {
        io::Error::other(error)
    }
}

/// Failure to enumerate the log directory.
///
/// Raised only when the directory itself cannot be read; entries that fail
/// to decode are skipped silently.
#[derive(Debug, Error)]
#[error("failed to read log directory {directory:?}: {source}")]
pub(crate) struct ScanError {
    pub(crate) directory: PathBuf,
    #[source]
    pub(crate) source: io::Error,
}
