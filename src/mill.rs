//! Background maintenance worker for backup segments.
//!
//! Consumes unit wakeups from a bounded channel and performs all backup
//! maintenance: gzip-compressing uncompressed backups and pruning the oldest
//! ones until the aggregate on-disk size fits the quota. Runs on a dedicated
//! [`std::thread`] so the writer never blocks on compression.
//!
//! # Thread protocol
//!
//! ```text
//! Writer thread                    Mill thread
//! ─────────────                    ───────────
//! rotate / lazy open ──(wakeup)──▶ scan, compress, prune
//! rotate / lazy open ──(wakeup)──▶ (bursts collapse: capacity 2)
//! close: drop sender ────────────▶ drain pending wakeups, exit
//! ```
//!
//! The channel capacity of two collapses wakeup bursts: one slot for the
//! pass in progress, one for the "state changed again" nudge. A full channel
//! drops the signal because every pass starts from a fresh directory scan
//! and sees the rotations that raced it.
//!
//! Failures never surface to the writer. A backup that fails to compress is
//! kept uncompressed and retried on the next pass; a backup that fails to
//! delete stops the pruning loop until the next wakeup.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::{self, JoinHandle};

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::debug;

use crate::filename::{BackupPattern, COMPRESS_SUFFIX};
use crate::scan::old_segments;

/// Bounded wakeup-channel capacity; collapses rotation bursts.
const WAKEUP_CAPACITY: usize = 2;

/// Suffix of the staging file a compression writes before its atomic rename.
const STAGING_SUFFIX: &str = ".tmp";

/// Everything the mill needs to maintain one logger's backup set.
#[derive(Debug)]
pub(crate) struct MillConfig {
    /// Path of the active log file; statted for quota accounting, never
    /// modified.
    pub(crate) active_path: PathBuf,
    /// Directory holding the active file and its backups.
    pub(crate) directory: PathBuf,
    /// Naming scheme identifying this logger's backups.
    pub(crate) pattern: BackupPattern,
    /// Aggregate on-disk ceiling in bytes; zero disables pruning.
    pub(crate) max_total_bytes: u64,
}

/// Spawns the mill thread and returns its wakeup sender and join handle.
///
/// Dropping every sender clone closes the channel; the mill drains any
/// pending wakeup, finishes its current pass, and exits.
pub(crate) fn spawn(config: MillConfig) -> (SyncSender<()>, JoinHandle<()>) {
    let (wakeup_tx, wakeup_rx) = sync_channel::<()>(WAKEUP_CAPACITY);

    let handle = thread::Builder::new()
        .name("logmill-mill".into())
        .spawn(move || mill_main(&wakeup_rx, &config))
        .expect("failed to spawn log maintenance thread");

    (wakeup_tx, handle)
}

fn mill_main(wakeup_rx: &Receiver<()>, config: &MillConfig) {
    while wakeup_rx.recv().is_ok() {
        compress_pass(config);
        quota_pass(config);
    }
}

/// Gzips every uncompressed backup, deleting the original on success.
///
/// Runs before the quota pass so pruning decisions see post-compression
/// sizes, and runs even when the quota is disabled.
fn compress_pass(config: &MillConfig) {
    let segments = match old_segments(&config.directory, &config.pattern) {
        Ok(segments) => segments,
        Err(error) => {
            debug!(error = %error, "skipping compression pass");
            return;
        }
    };

    for segment in segments.iter().filter(|segment| !segment.compressed) {
        match compress_segment(&segment.path) {
            Ok(()) => debug!(path = %segment.path.display(), "compressed backup"),
            Err(error) => debug!(
                path = %segment.path.display(),
                error = %error,
                "failed to compress backup; keeping original",
            ),
        }
    }
}

/// Replaces `source` with a gzip-compressed `.gz` sibling.
///
/// The compressed stream is written to a staging file and renamed into place
/// once complete, so a crash mid-compression never leaves a truncated `.gz`
/// posing as a finished backup. The staging name does not decode as a
/// segment and is invisible to scans.
fn compress_segment(source: &Path) -> io::Result<()> {
    let mut target = source.as_os_str().to_os_string();
    target.push(COMPRESS_SUFFIX);
    let target = PathBuf::from(target);

    let mut staging = target.clone().into_os_string();
    staging.push(STAGING_SUFFIX);
    let staging = PathBuf::from(staging);

    match write_gzip(source, &staging) {
        Ok(()) => {
            fs::rename(&staging, &target)?;
            fs::remove_file(source)
        }
        Err(error) => {
            let _ = fs::remove_file(&staging);
            Err(error)
        }
    }
}

fn write_gzip(source: &Path, staging: &Path) -> io::Result<()> {
    let mut input = File::open(source)?;

    let output = File::create(staging)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staging, fs::Permissions::from_mode(0o644))?;
    }

    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    Ok(())
}

/// Deletes the oldest backups until the aggregate size fits the quota.
///
/// The total counts the active file plus every backup. The newest backup is
/// never deleted, no matter how far over the quota the set remains, and the
/// active file is not the mill's to touch. A failed deletion defers the
/// rest of the pruning to the next wakeup.
fn quota_pass(config: &MillConfig) {
    if config.max_total_bytes == 0 {
        return;
    }

    let segments = match old_segments(&config.directory, &config.pattern) {
        Ok(segments) => segments,
        Err(error) => {
            debug!(error = %error, "skipping quota pass");
            return;
        }
    };

    let active_bytes = fs::metadata(&config.active_path)
        .map(|metadata| metadata.len())
        .unwrap_or(0);
    let mut total = segments
        .iter()
        .fold(active_bytes, |total, segment| total + segment.size);

    for stale in segments.iter().skip(1).rev() {
        if total <= config.max_total_bytes {
            break;
        }
        if let Err(error) = fs::remove_file(&stale.path) {
            debug!(
                path = %stale.path.display(),
                error = %error,
                "failed to delete backup; deferring quota enforcement",
            );
            return;
        }
        debug!(path = %stale.path.display(), "pruned backup");
        total = total.saturating_sub(stale.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn fixture(directory: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = directory.join(name);
        fs::write(&path, content).expect("write fixture");
        path
    }

    fn config(directory: &Path, max_total_bytes: u64) -> MillConfig {
        MillConfig {
            active_path: directory.join("foobar.log"),
            directory: directory.to_path_buf(),
            pattern: BackupPattern::from_path(Path::new("foobar.log")),
            max_total_bytes,
        }
    }

    fn gunzip(path: &Path) -> Vec<u8> {
        let file = File::open(path).expect("open gzip");
        let mut decoder = flate2::read::GzDecoder::new(file);
        let mut decoded = Vec::new();
        decoder.read_to_end(&mut decoded).expect("decode gzip");
        decoded
    }

    #[test]
    fn compress_segment_replaces_original_with_gzip() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = fixture(temp.path(), "foobar-100.log", b"payload");

        compress_segment(&source).expect("compress");

        assert!(!source.exists());
        let target = temp.path().join("foobar-100.log.gz");
        assert_eq!(gunzip(&target), b"payload");
    }

    #[test]
    fn compress_segment_overwrites_stale_sibling() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = fixture(temp.path(), "foobar-100.log", b"payload");
        fixture(temp.path(), "foobar-100.log.gz", b"");

        compress_segment(&source).expect("compress");

        assert_eq!(gunzip(&temp.path().join("foobar-100.log.gz")), b"payload");
    }

    #[test]
    fn quota_pass_deletes_oldest_first_and_keeps_newest() {
        let temp = tempfile::tempdir().expect("tempdir");
        fixture(temp.path(), "foobar.log", b"activ");
        fixture(temp.path(), "foobar-100.log.gz", b"aaaa");
        fixture(temp.path(), "foobar-200.log.gz", b"bbbb");
        fixture(temp.path(), "foobar-300.log.gz", b"cccc");

        quota_pass(&config(temp.path(), 1));

        assert!(!temp.path().join("foobar-100.log.gz").exists());
        assert!(!temp.path().join("foobar-200.log.gz").exists());
        assert!(temp.path().join("foobar-300.log.gz").exists());
        assert!(temp.path().join("foobar.log").exists());
    }

    #[test]
    fn quota_pass_stops_once_total_fits() {
        let temp = tempfile::tempdir().expect("tempdir");
        fixture(temp.path(), "foobar.log", b"1234");
        fixture(temp.path(), "foobar-100.log.gz", b"1234");
        fixture(temp.path(), "foobar-200.log.gz", b"1234");
        fixture(temp.path(), "foobar-300.log.gz", b"1234");

        quota_pass(&config(temp.path(), 12));

        assert!(!temp.path().join("foobar-100.log.gz").exists());
        assert!(temp.path().join("foobar-200.log.gz").exists());
        assert!(temp.path().join("foobar-300.log.gz").exists());
    }

    #[test]
    fn quota_pass_disabled_when_limit_is_zero() {
        let temp = tempfile::tempdir().expect("tempdir");
        fixture(temp.path(), "foobar.log", b"lots of active bytes");
        fixture(temp.path(), "foobar-100.log.gz", b"backup");

        quota_pass(&config(temp.path(), 0));

        assert!(temp.path().join("foobar-100.log.gz").exists());
    }
}
