//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod retry;

use std::fs;
use std::io;
use std::path::Path;

/// Write `content` to `path` so a crash mid-write never leaves a torn file.
///
/// The data goes to a sibling `*.tmp` file first and is then renamed over
/// the destination. Parent directories are created when missing.
pub fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Format a number of seconds as "1 day 2 hours 3 minutes".
///
/// Zero-valued units are omitted; a zero duration renders as "0 seconds".
pub fn human_duration(total_secs: i64) -> String {
    const UNITS: &[(&str, i64)] = &[
        ("day", 86_400),
        ("hour", 3_600),
        ("minute", 60),
        ("second", 1),
    ];

    let mut remaining = total_secs.max(0);
    let mut parts = Vec::new();

    for (name, size) in UNITS {
        let value = remaining / size;
        remaining %= size;
        if value > 0 {
            let plural = if value > 1 { "s" } else { "" };
            parts.push(format!("{value} {name}{plural}"));
        }
    }

    if parts.is_empty() {
        String::from("0 seconds")
    } else {
        parts.join(" ")
    }
}
