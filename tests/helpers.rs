//! Shared fixtures for the integration tests: a manually advanced clock,
//! reference gzip encoding, and filesystem assertions.

#![allow(dead_code)] // Each test binary uses its own subset of the helpers.

use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use flate2::Compression;
use flate2::write::GzEncoder;
use logmill::Clock;

/// Active-file name used by every scenario.
pub const ACTIVE_NAME: &str = "foobar.log";

/// Fixed starting instant so backup names are reproducible.
pub fn base_time() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

/// Wall clock that only moves when a test advances it.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward by two days, mirroring the gap between
    /// rotations in the scenarios.
    pub fn tick(&self) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += Duration::from_secs(2 * 24 * 60 * 60);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

/// Backup filename for `ACTIVE_NAME` at the clock's current instant.
pub fn backup_name(clock: &ManualClock) -> String {
    let seconds = clock
        .now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs();
    format!("foobar-{seconds}.log")
}

/// Reference gzip encoding at the default level, for byte-exact comparison
/// with what the mill produces.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

pub fn assert_content(path: &Path, expected: &[u8]) {
    let actual =
        fs::read(path).unwrap_or_else(|error| panic!("failed to read {}: {error}", path.display()));
    assert_eq!(actual, expected, "unexpected content in {}", path.display());
}

pub fn assert_missing(path: &Path) {
    assert!(
        !path.exists(),
        "expected {} to have been removed",
        path.display()
    );
}

pub fn file_count(directory: &Path) -> usize {
    fs::read_dir(directory).expect("read log directory").count()
}
