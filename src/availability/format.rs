//! Sectioned plain-text format for the availability file
//!
//! ```text
//! # comments start with '#'
//! [alice]
//! MON
//! 2016-02-24
//!
//! [bob]
//! TUE
//! ```
//!
//! Entry tokens are case-insensitive on read and written uppercase.
//! Sections are written sorted by name, each followed by a blank line.

use std::collections::BTreeMap;

use super::DayOff;

/// Records keyed by person name, entries in insertion order
pub type Records = BTreeMap<String, Vec<DayOff>>;

/// Outcome of parsing an availability file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parsed {
    /// Person records found in the file
    pub records: Records,
    /// Lines that could not be used, as `(line number, content)`
    pub rejected: Vec<(usize, String)>,
}

/// Parse the sectioned text representation.
///
/// Blank lines and `#` comments are skipped. Entry lines outside any
/// section, and tokens that are neither dates nor weekdays, are collected
/// in [`Parsed::rejected`] instead of failing the whole file. Repeated
/// sections for the same person are merged.
pub fn parse(content: &str) -> Parsed {
    let mut parsed = Parsed::default();
    let mut current: Option<String> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        let line_no = idx + 1;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(name) = section_name(line) {
            if name.is_empty() {
                parsed.rejected.push((line_no, line.to_string()));
                current = None;
            } else {
                parsed.records.entry(name.to_string()).or_default();
                current = Some(name.to_string());
            }
            continue;
        }

        let Some(person) = current.as_ref() else {
            parsed.rejected.push((line_no, line.to_string()));
            continue;
        };

        match line.parse::<DayOff>() {
            Ok(day) => {
                let entries = parsed.records.entry(person.clone()).or_default();
                if !entries.contains(&day) {
                    entries.push(day);
                }
            }
            Err(_) => parsed.rejected.push((line_no, line.to_string())),
        }
    }

    parsed
}

/// Render records in the sectioned text representation
pub fn render(records: &Records) -> String {
    let mut out = String::new();

    for (name, entries) in records {
        out.push('[');
        out.push_str(name);
        out.push_str("]\n");
        for entry in entries {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out.push('\n');
    }

    out
}

fn section_name(line: &str) -> Option<&str> {
    line.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::trim)
}
