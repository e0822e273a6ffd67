#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logmill` is a size-bounded, rotating, gzip-compressing log file sink. A
//! [`Logger`] exposes a plain byte-stream write surface (it implements
//! [`std::io::Write`]) and, behind that surface, keeps a bounded set of
//! historical log segments on disk: the active file grows until a configured
//! size threshold is crossed, at which point it is renamed with a Unix
//! timestamp suffix, a fresh active file is opened, and a background worker
//! compresses the backups and prunes the oldest ones until the aggregate
//! on-disk footprint fits under a configured ceiling.
//!
//! # Design
//!
//! - The write/rotate path is synchronous and serialised by a single mutex.
//!   A write never spans two files: either it fits in the current active file
//!   or rotation happens first and the whole write lands in the fresh one.
//! - Backup maintenance runs on a dedicated thread (the mill). The writer
//!   nudges it through a bounded wakeup channel and never waits for it; a
//!   full channel simply drops the nudge because the mill works from a fresh
//!   directory scan on every pass anyway.
//! - Segment identity lives in the filename: `app-<unix_seconds>.log` for an
//!   uncompressed backup, plus a `.gz` suffix once compressed. The on-disk
//!   set is therefore self-describing after a restart, and backups left
//!   uncompressed by a crash are picked up on the next mill pass.
//!
//! # Invariants
//!
//! - Exactly one active file exists per [`Logger`]; its name is exactly the
//!   configured path. The mill never touches it.
//! - While the active file is open, the cached size equals the file's length,
//!   so the rotation check costs no `stat`.
//! - Writes reach the filesystem in call order, and every write issued before
//!   a rotation lands in the pre-rotation segment.
//! - Directory entries that do not match the backup naming scheme are never
//!   scanned, compressed, or deleted.
//!
//! # Errors
//!
//! Failures on the synchronous path surface to the caller: plain I/O errors
//! as [`std::io::Error`], composite rotation failures as [`RotateError`]. The
//! logger stays usable after either; the next write retries the lazy open.
//! Failures inside the mill are logged through [`tracing`] and retried on a
//! later pass, since no caller is waiting on them.
//!
//! # Examples
//!
//! ```
//! use std::io::Write;
//!
//! use logmill::Logger;
//!
//! # fn main() -> std::io::Result<()> {
//! let directory = tempfile::tempdir()?;
//! let mut logger = Logger::builder(directory.path().join("app.log"))
//!     .max_segment_size(10)
//!     .max_total_size(50)
//!     .build();
//!
//! logger.write_all(b"starting up\n")?;
//! logger.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # See also
//!
//! - [`LoggerBuilder`] for the full configuration surface.
//! - [`Clock`] for injecting a fake wall clock in tests.

mod clock;
mod error;
mod filename;
mod logger;
mod mill;
mod scan;

pub use clock::{Clock, SystemClock};
pub use error::RotateError;
pub use logger::{FormatFn, Logger, LoggerBuilder};
