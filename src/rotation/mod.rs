//! Round-robin duty rotation
//!
//! The engine owns the roster (sorted, deduplicated) and the index of the
//! person currently on duty. Advancing walks forward from the slot after
//! the current one and picks the first person who is available on the
//! given date; when nobody is, it still moves exactly one slot so the duty
//! never gets stuck.
//!
//! # Example
//!
//! ```ignore
//! use sheriff::availability::AvailabilityStore;
//! use sheriff::rotation::RotationEngine;
//! use chrono::NaiveDate;
//!
//! let mut store = AvailabilityStore::in_memory();
//! store.add("alice", ["MON"]);
//!
//! let mut engine = RotationEngine::new(["carol", "alice", "bob"])?;
//! let monday = NaiveDate::from_ymd_opt(2016, 2, 22).unwrap();
//!
//! assert_eq!(engine.current().name, "alice");
//! assert_eq!(engine.advance(monday, &mut store).name, "bob");
//! assert_eq!(engine.advance(monday, &mut store).name, "carol");
//! ```

pub mod state;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::availability::Availability;

pub use state::{FileStateStore, MemoryStateStore, StateStore};

/// Roster and rotation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RotationError {
    /// No usable names were supplied
    #[error("the roster is empty; configure at least one team member")]
    EmptyRoster,
}

/// A person together with their roster slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    /// Person name as it appears in the roster
    pub name: String,
    /// Zero-based roster index
    pub index: usize,
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.index)
    }
}

/// Round-robin selector over a fixed roster
#[derive(Debug, Clone)]
pub struct RotationEngine {
    roster: Vec<String>,
    index: usize,
}

impl RotationEngine {
    /// Build an engine from member names.
    ///
    /// Names are trimmed, blanks dropped, then sorted and deduplicated. The
    /// rotation starts at index 0.
    pub fn new<I, S>(members: I) -> Result<Self, RotationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roster: Vec<String> = members
            .into_iter()
            .map(|m| m.as_ref().trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        roster.sort();
        roster.dedup();

        if roster.is_empty() {
            return Err(RotationError::EmptyRoster);
        }

        Ok(Self { roster, index: 0 })
    }

    /// Ordered roster
    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// Roster size (never zero)
    pub fn len(&self) -> usize {
        self.roster.len()
    }

    /// Always `false`; an engine cannot be built from an empty roster
    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Current index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Person currently on duty
    pub fn current(&self) -> Assignment {
        self.assignment(self.index)
    }

    /// First roster member whose name starts with `prefix`, ignoring case
    pub fn find_member(&self, prefix: &str) -> Option<Assignment> {
        let needle = prefix.trim().to_lowercase();
        self.roster
            .iter()
            .position(|name| name.to_lowercase().starts_with(&needle))
            .map(|index| self.assignment(index))
    }

    /// The slot after the current one, ignoring availability
    pub fn following(&self) -> Assignment {
        self.assignment((self.index + 1) % self.len())
    }

    /// Next person available on `date`, without moving the rotation.
    ///
    /// Candidates are tried from `index + 1` onwards, wrapping around and
    /// ending with the current person. If nobody is available the result
    /// is `index + 1` regardless.
    pub fn next_eligible<A>(&self, date: NaiveDate, availability: &mut A) -> Assignment
    where
        A: Availability + ?Sized,
    {
        let n = self.len();

        for step in 1..=n {
            let candidate = (self.index + step) % n;
            if availability.is_available(&self.roster[candidate], date) {
                return self.assignment(candidate);
            }
            debug!(person = %self.roster[candidate], %date, "Skipping unavailable candidate");
        }

        let fallback = self.following();
        info!(
            %date,
            person = %fallback.name,
            "Nobody is available, falling back to the next slot"
        );
        fallback
    }

    /// Move to the next person available on `date` and return them
    pub fn advance<A>(&mut self, date: NaiveDate, availability: &mut A) -> Assignment
    where
        A: Availability + ?Sized,
    {
        let next = self.next_eligible(date, availability);
        self.index = next.index;
        next
    }

    /// Point the rotation at the first member matching `prefix`.
    ///
    /// Returns `None` and leaves the rotation untouched when nobody matches.
    pub fn set_current(&mut self, prefix: &str) -> Option<Assignment> {
        let found = self.find_member(prefix)?;
        self.index = found.index;
        Some(found)
    }

    /// Restore a position, wrapping it into the roster
    pub fn set_index(&mut self, index: usize) -> Assignment {
        self.index = index % self.len();
        self.current()
    }

    fn assignment(&self, index: usize) -> Assignment {
        Assignment {
            name: self.roster[index].clone(),
            index,
        }
    }
}
