//! The public byte-sink façade: lazy open, rotation, and size accounting.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::error::RotateError;
use crate::filename::BackupPattern;
use crate::mill::{self, MillConfig};

/// Default multiplier applied to the configured size limits: one mebibyte.
const DEFAULT_SIZE_UNIT: u64 = 1 << 20;

/// Per-write transform invoked before bytes reach the active file.
///
/// The callback receives the caller's bytes and a reusable scratch buffer
/// that has been cleared; it appends the formatted output (framing plus
/// payload) to the buffer and returns the number of leading framing bytes.
/// Framing counts toward the on-disk size that drives rotation, but not
/// toward the byte count reported back to the caller.
pub type FormatFn = Box<dyn Fn(&[u8], &mut Vec<u8>) -> usize + Send>;

/// Builder for [`Logger`].
///
/// Both size limits default to zero, which disables the corresponding
/// behaviour: a zero segment limit never rotates on size and a zero total
/// limit never prunes backups.
pub struct LoggerBuilder {
    path: PathBuf,
    max_segment_size: u64,
    max_total_size: u64,
    size_unit: u64,
    format: Option<FormatFn>,
    clock: Arc<dyn Clock>,
}

impl LoggerBuilder {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            max_segment_size: 0,
            max_total_size: 0,
            size_unit: DEFAULT_SIZE_UNIT,
            format: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the active-file size threshold that triggers rotation, in units
    /// of [`size_unit`](Self::size_unit). Zero disables size-based rotation.
    #[must_use]
    pub fn max_segment_size(mut self, limit: u64) -> Self {
        self.max_segment_size = limit;
        self
    }

    /// Sets the aggregate on-disk ceiling across the active file and every
    /// backup, in units of [`size_unit`](Self::size_unit). Zero disables the
    /// quota.
    #[must_use]
    pub fn max_total_size(mut self, limit: u64) -> Self {
        self.max_total_size = limit;
        self
    }

    /// Overrides the byte multiplier applied to both size limits.
    ///
    /// Defaults to one mebibyte; tests set it to `1` to express limits in
    /// bytes.
    #[must_use]
    pub fn size_unit(mut self, bytes: u64) -> Self {
        self.size_unit = bytes;
        self
    }

    /// Installs a per-write formatting callback. See [`FormatFn`].
    #[must_use]
    pub fn format<F>(mut self, format: F) -> Self
    where
        F: Fn(&[u8], &mut Vec<u8>) -> usize + Send + 'static,
    {
        self.format = Some(Box::new(format));
        self
    }

    /// Substitutes the wall-clock source used to name backups.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the logger and starts its mill thread.
    ///
    /// The active file is not opened eagerly; the first write performs the
    /// lazy open.
    #[must_use]
    pub fn build(self) -> Logger {
        let path: PathBuf = self.path.components().collect();
        let pattern = BackupPattern::from_path(&path);
        let directory = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let (mill_tx, mill_handle) = mill::spawn(MillConfig {
            active_path: path.clone(),
            directory,
            pattern: pattern.clone(),
            max_total_bytes: self.max_total_size.saturating_mul(self.size_unit),
        });

        Logger {
            path,
            pattern,
            max_segment_bytes: self.max_segment_size.saturating_mul(self.size_unit),
            writer: Mutex::new(WriterState {
                file: None,
                active_bytes: 0,
                scratch: Vec::new(),
                format: self.format,
                clock: self.clock,
                mill_tx: Some(mill_tx),
            }),
            mill_handle: Mutex::new(Some(mill_handle)),
        }
    }
}

/// Rotating, compressing log file sink.
///
/// Writes append to the file at the configured path. When a write would push
/// the active file past the segment limit, the file is first renamed to
/// `<stem>-<unix_seconds><ext>` and a fresh active file is opened, so the
/// write lands wholly in exactly one segment. The mill thread then
/// compresses the new backup and prunes old ones in the background.
///
/// All methods take `&self`; concurrent callers are serialised by an
/// internal mutex. [`io::Write`] is implemented for both `Logger` and
/// `&Logger`.
pub struct Logger {
    path: PathBuf,
    pattern: BackupPattern,
    max_segment_bytes: u64,
    writer: Mutex<WriterState>,
    mill_handle: Mutex<Option<JoinHandle<()>>>,
}

struct WriterState {
    file: Option<File>,
    active_bytes: u64,
    scratch: Vec<u8>,
    format: Option<FormatFn>,
    clock: Arc<dyn Clock>,
    mill_tx: Option<SyncSender<()>>,
}

impl WriterState {
    /// Flushes and closes the active file, if open.
    fn close_file(&mut self) -> io::Result<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        file.flush()
    }

    /// Nudges the mill without blocking; a full channel drops the signal.
    fn wake_mill(&self) {
        if let Some(mill_tx) = &self.mill_tx {
            let _ = mill_tx.try_send(());
        }
    }
}

impl Logger {
    /// Starts configuring a logger writing to `path`.
    pub fn builder(path: impl Into<PathBuf>) -> LoggerBuilder {
        LoggerBuilder::new(path.into())
    }

    /// Returns the path of the active log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `bytes` to the active file, rotating first if the write would
    /// push it past the segment limit.
    ///
    /// Returns the number of caller bytes consumed, which on success is
    /// `bytes.len()` even when a formatting callback expanded the output on
    /// disk. A single write never spans two segments.
    pub fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        let mut state = self.lock_writer();
        let state = &mut *state;

        if state.file.is_none() {
            self.open_existing_or_new(state, bytes.len())?;
        } else if self.max_segment_bytes > 0
            && state.active_bytes.saturating_add(bytes.len() as u64) > self.max_segment_bytes
        {
            self.rotate_locked(state)?;
        }

        match &state.format {
            Some(format) => {
                state.scratch.clear();
                let payload_start = format(bytes, &mut state.scratch);
                let written = active_file(&mut state.file)?.write(&state.scratch)?;
                state.active_bytes += written as u64;
                if written < payload_start {
                    return Ok(0);
                }
                Ok((written - payload_start).min(bytes.len()))
            }
            None => {
                let written = active_file(&mut state.file)?.write(bytes)?;
                state.active_bytes += written as u64;
                Ok(written)
            }
        }
    }

    /// Pushes buffered bytes to the operating system.
    ///
    /// The sink writes through an unbuffered [`File`], so this is a no-op
    /// unless the platform buffers behind the handle.
    pub fn flush(&self) -> io::Result<()> {
        match self.lock_writer().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    /// Forces an immediate rotation: the active file is moved aside to a
    /// timestamped backup and a fresh active file is opened.
    pub fn rotate(&self) -> Result<(), RotateError> {
        let mut state = self.lock_writer();
        self.rotate_locked(&mut state)
    }

    /// Flushes and closes the active file, then stops the mill and waits for
    /// it to finish any pending maintenance.
    ///
    /// Closing is idempotent; repeated calls return `Ok(())` without side
    /// effects.
    pub fn close(&self) -> io::Result<()> {
        let closed = {
            let mut state = self.lock_writer();
            let closed = state.close_file();
            // Dropping the sole sender closes the wakeup channel; the mill
            // drains buffered wakeups before it exits.
            state.mill_tx = None;
            closed
        };

        let handle = self
            .mill_handle
            .lock()
            .expect("mill handle mutex poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }

        closed
    }

    fn lock_writer(&self) -> MutexGuard<'_, WriterState> {
        self.writer.lock().expect("log writer mutex poisoned")
    }

    /// Opens the file at the configured path, rotating it away first when
    /// the pending write would not fit.
    fn open_existing_or_new(&self, state: &mut WriterState, write_len: usize) -> io::Result<()> {
        // A fresh open means the on-disk backup set may predate this
        // process; give the mill a chance to compress leftovers.
        state.wake_mill();

        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return self.open_fresh(state);
            }
            Err(error) => return Err(error),
        };

        if self.max_segment_bytes > 0
            && metadata.len().saturating_add(write_len as u64) > self.max_segment_bytes
        {
            return self.rotate_locked(state).map_err(io::Error::from);
        }

        match OpenOptions::new().append(true).open(&self.path) {
            Ok(file) => {
                state.file = Some(file);
                state.active_bytes = metadata.len();
                Ok(())
            }
            // The old file is unusable for appending; start over rather
            // than failing the write.
            Err(_) => self.open_fresh(state),
        }
    }

    /// Creates or truncates the active file with mode `0644`.
    fn open_fresh(&self, state: &mut WriterState) -> io::Result<()> {
        let file = File::create(&self.path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o644))?;
        }
        state.file = Some(file);
        state.active_bytes = 0;
        Ok(())
    }

    /// Closes the active file, renames it to its backup name, opens a fresh
    /// active file, and wakes the mill.
    fn rotate_locked(&self, state: &mut WriterState) -> Result<(), RotateError> {
        state.close_file().map_err(|source| RotateError::Close {
            path: self.path.clone(),
            source,
        })?;

        if self.path.exists() {
            let backup = self
                .path
                .with_file_name(self.pattern.backup_name(state.clock.now()));
            // Renaming overwrites an existing backup; back-to-back rotations
            // within one second keep only the later segment.
            fs::rename(&self.path, &backup).map_err(|source| RotateError::Rename {
                path: self.path.clone(),
                backup,
                source,
            })?;
        }

        self.open_fresh(state).map_err(|source| RotateError::Open {
            path: self.path.clone(),
            source,
        })?;

        state.wake_mill();
        Ok(())
    }
}

fn active_file(file: &mut Option<File>) -> io::Result<&mut File> {
    file.as_mut()
        .ok_or_else(|| io::Error::other("active log file is not open"))
}

impl io::Write for Logger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Logger::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Logger::flush(self)
    }
}

impl io::Write for &Logger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Logger::write(*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Logger::flush(*self)
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("path", &self.path)
            .field("max_segment_bytes", &self.max_segment_bytes)
            .finish_non_exhaustive()
    }
}
