//! Backup artifact: newline-delimited `"<key> <value>"` records.
//!
//! The key runs up to the first space and may not be empty; the rest of the
//! line is the value. A restore replays records as puts and stops at the first
//! malformed line.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use crate::error::{ChordError, Result};

/// Writes one record per entry, in key order. Returns the number written.
///
/// Entries that could not be read back (whitespace in the key, line breaks in
/// the value, empty values) are skipped with a warning.
pub fn write_records<W: Write>(sink: &mut W, entries: &BTreeMap<String, String>) -> Result<usize> {
    let mut written = 0;

    for (key, value) in entries {
        if !is_representable(key, value) {
            tracing::warn!("Skipping entry {:?} that cannot be written as a record", key);
            continue;
        }
        writeln!(sink, "{} {}", key, value)?;
        written += 1;
    }

    sink.flush()?;
    Ok(written)
}

/// Parses line `line_no` (1-based) of an artifact.
pub fn parse_record(line_no: usize, line: &str) -> Result<(String, String)> {
    match line.split_once(' ') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => {
            Ok((key.to_string(), value.to_string()))
        }
        _ => Err(ChordError::MalformedRecord {
            line: line_no,
            content: line.to_string(),
        }),
    }
}

/// Lazily parses an artifact; iteration yields an error for the first bad line.
pub fn records<R: BufRead>(reader: R) -> impl Iterator<Item = Result<(String, String)>> {
    reader
        .lines()
        .enumerate()
        .map(|(idx, line)| parse_record(idx + 1, &line?))
}

fn is_representable(key: &str, value: &str) -> bool {
    !key.is_empty()
        && !key.contains(char::is_whitespace)
        && !value.is_empty()
        && !value.contains(['\n', '\r'])
}
