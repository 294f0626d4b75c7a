//! Team availability tracking
//!
//! Every person may declare days off, either as absolute calendar dates
//! (`2016-02-22`) or as recurring weekdays (`MON` .. `FRI`). The rotation
//! engine asks this module whether a candidate is available on the day the
//! duty changes hands.
//!
//! # Modules
//!
//! - [`format`] - Sectioned plain-text representation of the store
//! - [`store`] - In-memory store with file persistence and expiry cleanup
//!
//! # Example
//!
//! ```ignore
//! use sheriff::availability::{Availability, AvailabilityStore};
//! use chrono::NaiveDate;
//!
//! let mut store = AvailabilityStore::in_memory();
//! let change = store.add("alice", ["mon", "2016-02-24", "someday"]);
//! assert!(change.changed);
//! assert_eq!(change.invalid, vec!["SOMEDAY".to_string()]);
//!
//! let monday = NaiveDate::from_ymd_opt(2016, 2, 22).unwrap();
//! assert!(!store.is_available("alice", monday));
//! ```

pub mod format;
pub mod store;

use chrono::{Datelike, Local, NaiveDate, Weekday};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

pub use store::{AvailabilityStore, ChangeSet};

/// Weekdays a person may mark as recurring days off, in token order
pub const WEEKDAY_TOKENS: [(&str, Weekday); 5] = [
    ("MON", Weekday::Mon),
    ("TUE", Weekday::Tue),
    ("WED", Weekday::Wed),
    ("THU", Weekday::Thu),
    ("FRI", Weekday::Fri),
];

/// Source of "today" for expiry decisions
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Clock backed by the local wall-clock date
pub fn system_clock() -> Clock {
    Arc::new(|| Local::now().date_naive())
}

/// Clock that always reports the same date
pub fn fixed_clock(date: NaiveDate) -> Clock {
    Arc::new(move || date)
}

// ============================================================================
// Day Off
// ============================================================================

/// A single unavailability entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayOff {
    /// One specific calendar date; expires once it is in the past
    Date(NaiveDate),
    /// Every occurrence of a working weekday; never expires
    Weekday(Weekday),
}

impl DayOff {
    /// Whether this entry makes a person unavailable on `date`
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            Self::Date(d) => *d == date,
            Self::Weekday(w) => date.weekday() == *w,
        }
    }

    /// Whether this entry lies strictly before `today`
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        match self {
            Self::Date(d) => *d < today,
            Self::Weekday(_) => false,
        }
    }
}

impl fmt::Display for DayOff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Weekday(w) => write!(f, "{}", weekday_token(*w).unwrap_or("???")),
        }
    }
}

/// Why a token was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DayOffParseError {
    /// Blank token
    #[error("empty day-off token")]
    Empty,
    /// Looks like `YYYY-MM-DD` but is not a real date
    #[error("'{0}' is not a valid calendar date")]
    InvalidDate(String),
    /// Neither a date nor a known weekday
    #[error("'{0}' is neither YYYY-MM-DD nor one of MON, TUE, WED, THU, FRI")]
    Unrecognized(String),
}

impl DayOffParseError {
    /// The normalized token that failed, if any
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::InvalidDate(t) | Self::Unrecognized(t) => Some(t),
        }
    }
}

impl FromStr for DayOff {
    type Err = DayOffParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static DATE_RE: OnceLock<Regex> = OnceLock::new();

        let token = s.trim().to_uppercase();
        if token.is_empty() {
            return Err(DayOffParseError::Empty);
        }

        let re = DATE_RE.get_or_init(|| {
            Regex::new(r"^[0-9]{4}-(0[1-9]|1[0-2])-(0[1-9]|[1-2][0-9]|3[0-1])$")
                .expect("Invalid regex pattern")
        });

        if re.is_match(&token) {
            return NaiveDate::parse_from_str(&token, "%Y-%m-%d")
                .map(Self::Date)
                .map_err(|_| DayOffParseError::InvalidDate(token));
        }

        WEEKDAY_TOKENS
            .iter()
            .find(|(name, _)| *name == token)
            .map(|(_, w)| Self::Weekday(*w))
            .ok_or(DayOffParseError::Unrecognized(token))
    }
}

/// Uppercase three-letter token for a working weekday
pub fn weekday_token(weekday: Weekday) -> Option<&'static str> {
    WEEKDAY_TOKENS
        .iter()
        .find(|(_, w)| *w == weekday)
        .map(|(name, _)| *name)
}

// ============================================================================
// Token sanitizing
// ============================================================================

/// Result of normalizing a batch of user-supplied tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sanitized {
    /// Parsed entries, in input order
    pub valid: Vec<DayOff>,
    /// Rejected tokens, trimmed and uppercased
    pub invalid: Vec<String>,
}

/// Split raw tokens into valid entries and rejected tokens.
///
/// Blank tokens are skipped silently.
pub fn sanitize<I, S>(tokens: I) -> Sanitized
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Sanitized::default();

    for token in tokens {
        match token.as_ref().parse::<DayOff>() {
            Ok(day) => out.valid.push(day),
            Err(DayOffParseError::Empty) => {}
            Err(e) => {
                if let Some(t) = e.token() {
                    out.invalid.push(t.to_string());
                }
            }
        }
    }

    out
}

// ============================================================================
// Availability query seam
// ============================================================================

/// Answers "is this person available on this date?"
///
/// Implementors may perform maintenance as part of the query, which is why
/// the receiver is mutable.
pub trait Availability {
    /// `true` unless the person has an entry matching `date`
    fn is_available(&mut self, name: &str, date: NaiveDate) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_weekday_case_insensitive() {
        assert_eq!("mon".parse::<DayOff>(), Ok(DayOff::Weekday(Weekday::Mon)));
        assert_eq!(" Fri ".parse::<DayOff>(), Ok(DayOff::Weekday(Weekday::Fri)));
        assert!(matches!(
            "sat".parse::<DayOff>(),
            Err(DayOffParseError::Unrecognized(t)) if t == "SAT"
        ));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            "2016-02-22".parse::<DayOff>(),
            Ok(DayOff::Date(date(2016, 2, 22)))
        );
        assert!(matches!(
            "2016-02-30".parse::<DayOff>(),
            Err(DayOffParseError::InvalidDate(_))
        ));
        // Not zero-padded
        assert!(matches!(
            "2016-2-22".parse::<DayOff>(),
            Err(DayOffParseError::Unrecognized(_))
        ));
    }

    #[test]
    fn test_display_round_trips_tokens() {
        assert_eq!(DayOff::Weekday(Weekday::Wed).to_string(), "WED");
        assert_eq!(DayOff::Date(date(2016, 1, 5)).to_string(), "2016-01-05");
    }

    #[test]
    fn test_weekday_matches_only_that_weekday() {
        let mon = DayOff::Weekday(Weekday::Mon);
        // 2016-02-22 is a Monday
        assert!(mon.matches(date(2016, 2, 22)));
        assert!(mon.matches(date(2030, 7, 1)));
        assert!(!mon.matches(date(2016, 2, 23)));
    }

    #[test]
    fn test_expiry() {
        let today = date(2016, 2, 22);
        assert!(DayOff::Date(date(2016, 2, 21)).is_expired(today));
        assert!(!DayOff::Date(today).is_expired(today));
        assert!(!DayOff::Weekday(Weekday::Tue).is_expired(today));
    }

    #[test]
    fn test_sanitize_splits_valid_and_invalid() {
        let result = sanitize(["mon", "1234", "vsdf", "2015-01-01", "  "]);
        assert_eq!(
            result.valid,
            vec![DayOff::Weekday(Weekday::Mon), DayOff::Date(date(2015, 1, 1))]
        );
        assert_eq!(result.invalid, vec!["1234".to_string(), "VSDF".to_string()]);
    }
}
