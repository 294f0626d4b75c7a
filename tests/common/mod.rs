//! Common test utilities

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use sheriff::availability::{fixed_clock, AvailabilityStore};
use sheriff::commands::DutyDesk;
use sheriff::rotation::RotationEngine;

/// 2016-02-22, a Monday
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2016, 2, 22).unwrap()
}

/// Temporary directory holding the two persisted files
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn daysoff(&self) -> PathBuf {
        self.dir.path().join("daysoff.txt")
    }

    pub fn state(&self) -> PathBuf {
        self.dir.path().join("cache.txt")
    }

    /// Desk over `members` backed by this workspace's availability file
    pub fn desk(&self, members: &[&str], today: NaiveDate) -> DutyDesk {
        let engine = RotationEngine::new(members).unwrap();
        let store = AvailabilityStore::open(self.daysoff(), fixed_clock(today));
        DutyDesk::new(engine, store)
    }
}

/// Non-blank lines of a file, trimmed
#[allow(dead_code)]
pub fn content_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}
