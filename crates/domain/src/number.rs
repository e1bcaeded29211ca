//! Date-prefixed sequential document numbers.
//!
//! Orders and returns share the same scheme: `PREFIX-YYYYMMDD-NNNN`, where
//! `NNNN` is one plus the highest sequence already issued for that day. The
//! store is responsible for serializing the per-day counter; this module
//! only formats.

use chrono::NaiveDate;

/// Formats a document number from its prefix, day, and sequence value.
pub fn format_number(prefix: &str, date: NaiveDate, sequence: u32) -> String {
    format!("{}-{}-{:04}", prefix, date.format("%Y%m%d"), sequence)
}

/// The per-day sequence key for a prefix (`PREFIX-YYYYMMDD`).
///
/// Two documents with the same key contend for the same counter.
pub fn day_key(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}", prefix, date.format("%Y%m%d"))
}
