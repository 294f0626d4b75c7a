//! Availability store with file persistence and expiry cleanup
//!
//! The store self-cleans: every save first purges absolute dates that lie
//! strictly before today, and every availability query runs a maintenance
//! pass (purge + save) before answering.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::format::{self, Records};
use super::{sanitize, system_clock, Availability, Clock, DayOff};
use crate::error::{Error, Result};
use crate::utils::write_atomic;

/// Outcome of an add or remove request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Whether the stored entries changed
    pub changed: bool,
    /// Tokens that were rejected, trimmed and uppercased
    pub invalid: Vec<String>,
}

/// Per-person unavailability records
///
/// Roster members registered with [`track`](AvailabilityStore::track)
/// always have a record, possibly empty.
pub struct AvailabilityStore {
    path: Option<PathBuf>,
    records: Records,
    roster: BTreeSet<String>,
    clock: Clock,
}

impl std::fmt::Debug for AvailabilityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityStore")
            .field("path", &self.path)
            .field("records", &self.records)
            .field("roster", &self.roster)
            .finish_non_exhaustive()
    }
}

impl AvailabilityStore {
    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Records::new(),
            roster: BTreeSet::new(),
            clock: system_clock(),
        }
    }

    /// Store backed by `path`; call [`load`](Self::load) to read it
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            records: Records::new(),
            roster: BTreeSet::new(),
            clock: system_clock(),
        }
    }

    /// Open and load the store at `path` in one step
    pub fn open(path: impl Into<PathBuf>, clock: Clock) -> Self {
        let mut store = Self::with_file(path).with_clock(clock);
        store.load();
        store
    }

    /// Replace the source of "today"
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The store's notion of today
    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    /// Read all records from the backing file.
    ///
    /// A missing or unreadable file yields an empty store. The store is
    /// saved right away so expired dates are purged and the file exists
    /// afterwards.
    pub fn load(&mut self) {
        let Some(path) = self.path.clone() else {
            return;
        };

        self.records = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let parsed = format::parse(&content);
                for (line, text) in &parsed.rejected {
                    warn!(path = %path.display(), line, text = %text, "Ignoring unusable line");
                }
                parsed.records
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No availability file yet, starting empty");
                Records::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read availability file, starting empty");
                Records::new()
            }
        };

        self.seed_roster();
        info!(
            path = %path.display(),
            people = self.records.len(),
            "Loaded availability records"
        );

        self.persist();
    }

    /// Register roster members so each of them keeps a record, even an
    /// empty one. Missing records are created and the store is saved.
    pub fn track<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.roster
            .extend(names.into_iter().map(|n| n.as_ref().to_string()));
        if self.seed_roster() > 0 {
            self.persist();
        }
    }

    /// Whether `name` was registered with [`track`](Self::track)
    pub fn is_tracked(&self, name: &str) -> bool {
        self.roster.contains(name)
    }

    fn seed_roster(&mut self) -> usize {
        let mut created = 0;
        for name in &self.roster {
            if !self.records.contains_key(name) {
                self.records.insert(name.clone(), Vec::new());
                created += 1;
            }
        }
        if created > 0 {
            debug!(created, "Created empty records for roster members");
        }
        created
    }

    /// Purge expired dates, then write the store to its backing file.
    ///
    /// An in-memory store only purges.
    pub fn save(&mut self) -> Result<()> {
        let today = self.today();
        self.purge_expired(today);

        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        write_atomic(path, &format::render(&self.records)).map_err(|e| Error::io(path, e))?;
        debug!(path = %path.display(), people = self.records.len(), "Saved availability records");
        Ok(())
    }

    /// Drop absolute dates strictly before `today`; returns how many were removed.
    ///
    /// People whose entries all expire stay on record with an empty set.
    pub fn purge_expired(&mut self, today: NaiveDate) -> usize {
        let mut purged = 0;
        for (name, entries) in self.records.iter_mut() {
            let before = entries.len();
            entries.retain(|d| !d.is_expired(today));
            let removed = before - entries.len();
            if removed > 0 {
                debug!(person = %name, removed, "Purged expired days off");
            }
            purged += removed;
        }
        purged
    }

    /// Maintenance pass run by every availability query: purge and persist.
    ///
    /// Persistence failures are logged and otherwise ignored.
    pub fn run_maintenance(&mut self) {
        self.persist();
    }

    /// Add day-off tokens for `name`.
    ///
    /// Valid tokens not yet present are appended; a person without a record
    /// only gets one when at least one entry was added. The store is saved
    /// when anything changed.
    pub fn add<I, S>(&mut self, name: &str, tokens: I) -> ChangeSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sanitized = sanitize(tokens);
        let changed = self.add_entries(name, &sanitized.valid);
        ChangeSet {
            changed,
            invalid: sanitized.invalid,
        }
    }

    /// Add already-parsed entries for `name`; returns whether anything changed
    pub fn add_entries(&mut self, name: &str, days: &[DayOff]) -> bool {
        let mut entries = self.records.get(name).cloned().unwrap_or_default();
        let mut changed = false;

        for day in days {
            if !entries.contains(day) {
                entries.push(*day);
                changed = true;
            }
        }

        if changed {
            info!(person = %name, entries = entries.len(), "Days off added");
            self.records.insert(name.to_string(), entries);
            self.persist();
        }

        changed
    }

    /// Remove day-off tokens for `name`.
    ///
    /// When the last entry goes, the person's record is dropped unless
    /// they are on the tracked roster. The store is saved when anything
    /// changed.
    pub fn remove<I, S>(&mut self, name: &str, tokens: I) -> ChangeSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sanitized = sanitize(tokens);
        let changed = self.remove_entries(name, &sanitized.valid);
        ChangeSet {
            changed,
            invalid: sanitized.invalid,
        }
    }

    /// Remove already-parsed entries for `name`; returns whether anything changed
    pub fn remove_entries(&mut self, name: &str, days: &[DayOff]) -> bool {
        let Some(entries) = self.records.get_mut(name) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|d| !days.contains(d));
        let changed = entries.len() != before;

        if changed {
            if entries.is_empty() && !self.roster.contains(name) {
                self.records.remove(name);
                info!(person = %name, "Days off cleared");
            } else {
                info!(person = %name, entries = entries.len(), "Days off removed");
            }
            self.persist();
        }

        changed
    }

    /// The person's entries, or `None` when there is no record at all
    pub fn get(&self, name: &str) -> Option<&[DayOff]> {
        self.records.get(name).map(Vec::as_slice)
    }

    /// Pure lookup without maintenance: no record means available
    pub fn check(&self, name: &str, date: NaiveDate) -> bool {
        self.records
            .get(name)
            .map_or(true, |entries| !entries.iter().any(|d| d.matches(date)))
    }

    /// Names with a record, sorted
    pub fn people(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Number of people with a record
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no one has a record
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn persist(&mut self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "Failed to persist availability records");
        }
    }
}

impl Availability for AvailabilityStore {
    fn is_available(&mut self, name: &str, date: NaiveDate) -> bool {
        self.run_maintenance();
        self.check(name, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::fixed_clock;
    use chrono::Weekday;

    const WITH_EXPIRED: &str = "\
[alice]
2016-01-02
MON

[bob]
2016-01-01
TUE
";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn non_empty_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_load_missing_file_creates_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daysoff.txt");

        let store = AvailabilityStore::open(&path, fixed_clock(date(2016, 2, 1)));

        assert!(store.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_load_purges_expired_and_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daysoff.txt");
        std::fs::write(&path, WITH_EXPIRED).unwrap();

        let store = AvailabilityStore::open(&path, fixed_clock(date(2016, 2, 1)));

        assert_eq!(store.get("alice"), Some(&[DayOff::Weekday(Weekday::Mon)][..]));
        assert_eq!(store.get("bob"), Some(&[DayOff::Weekday(Weekday::Tue)][..]));
        assert_eq!(non_empty_lines(&path), vec!["[alice]", "MON", "[bob]", "TUE"]);
    }

    #[test]
    fn test_unreadable_path_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daysoff.txt");
        // A directory cannot be read as a file
        std::fs::create_dir(&path).unwrap();

        let store = AvailabilityStore::open(&path, fixed_clock(date(2016, 2, 1)));
        assert!(store.is_empty());
        assert!(path.is_dir());
    }

    #[test]
    fn test_add_and_remove() {
        let mut store =
            AvailabilityStore::in_memory().with_clock(fixed_clock(date(2016, 2, 1)));

        let change = store.add("alice", ["mon", "bogus"]);
        assert!(change.changed);
        assert_eq!(change.invalid, vec!["BOGUS".to_string()]);

        // Adding the same entry again changes nothing
        assert!(!store.add("alice", ["MON"]).changed);

        let change = store.remove("alice", ["Mon"]);
        assert!(change.changed);
        assert_eq!(store.get("alice"), None);

        // Removing from an unknown person changes nothing
        assert!(!store.remove("zed", ["MON"]).changed);
    }

    #[test]
    fn test_add_with_only_invalid_tokens_creates_no_record() {
        let mut store = AvailabilityStore::in_memory();
        let change = store.add("carol", ["nope"]);
        assert!(!change.changed);
        assert_eq!(store.get("carol"), None);
    }

    #[test]
    fn test_add_then_remove_restores_previous_state() {
        let mut store =
            AvailabilityStore::in_memory().with_clock(fixed_clock(date(2016, 2, 1)));
        store.add("alice", ["MON"]);
        let before: Vec<DayOff> = store.get("alice").unwrap().to_vec();

        store.add("alice", ["2016-03-01"]);
        store.remove("alice", ["2016-03-01"]);

        assert_eq!(store.get("alice").unwrap(), before.as_slice());
    }

    #[test]
    fn test_is_available_weekday() {
        let mut store =
            AvailabilityStore::in_memory().with_clock(fixed_clock(date(2016, 2, 1)));
        store.add("alice", ["MON"]);

        // 2016-02-22 is a Monday
        assert!(!store.is_available("alice", date(2016, 2, 22)));
        assert!(store.is_available("alice", date(2016, 2, 23)));
        assert!(store.is_available("charley", date(2016, 2, 22)));
    }

    #[test]
    fn test_is_available_today_after_adding_today() {
        let today = date(2016, 2, 24);
        let mut store = AvailabilityStore::in_memory().with_clock(fixed_clock(today));
        store.add("alice", ["2016-02-24"]);
        assert!(!store.is_available("alice", today));
    }

    #[test]
    fn test_availability_query_persists_purge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daysoff.txt");

        let mut store = AvailabilityStore::open(&path, fixed_clock(date(2016, 2, 1)));
        store.add("alice", ["2016-02-10", "WED"]);

        // Time moves on past the absolute date
        let mut store = store.with_clock(fixed_clock(date(2016, 2, 11)));
        assert!(store.is_available("alice", date(2016, 2, 12)));

        assert_eq!(store.get("alice"), Some(&[DayOff::Weekday(Weekday::Wed)][..]));
        assert_eq!(non_empty_lines(&path), vec!["[alice]", "WED"]);
    }

    #[test]
    fn test_tracked_members_get_empty_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daysoff.txt");
        let mut store = AvailabilityStore::open(&path, fixed_clock(date(2016, 2, 1)));

        store.track(["alice", "bob"]);

        assert!(store.is_tracked("bob"));
        assert_eq!(store.get("bob"), Some(&[][..]));
        assert_eq!(store.get("zed"), None);
        assert_eq!(non_empty_lines(&path), vec!["[alice]", "[bob]"]);
    }

    #[test]
    fn test_remove_keeps_tracked_member_record() {
        let mut store =
            AvailabilityStore::in_memory().with_clock(fixed_clock(date(2016, 2, 1)));
        store.track(["alice"]);
        store.add("alice", ["MON"]);
        store.add("zed", ["MON"]);

        assert!(store.remove("alice", ["MON"]).changed);
        assert!(store.remove("zed", ["MON"]).changed);

        assert_eq!(store.get("alice"), Some(&[][..]));
        assert_eq!(store.get("zed"), None);
    }

    #[test]
    fn test_purge_keeps_person_with_empty_set() {
        let mut store =
            AvailabilityStore::in_memory().with_clock(fixed_clock(date(2016, 1, 1)));
        store.add("bob", ["2016-01-05"]);

        let purged = store.purge_expired(date(2016, 1, 6));

        assert_eq!(purged, 1);
        assert_eq!(store.get("bob"), Some(&[][..]));
    }
}
