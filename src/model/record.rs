//! Normalized export records and scan counters.

use chrono::{DateTime, Datelike, FixedOffset};

/// Header text with whitespace collapsed and encoded words decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedHeader(String);

impl NormalizedHeader {
    /// Wrap text that is already normalized.
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for NormalizedHeader {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NormalizedHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved `Date:` header, keeping the offset it was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate(DateTime<FixedOffset>);

impl ParsedDate {
    pub fn new(value: DateTime<FixedOffset>) -> Self {
        Self(value)
    }

    pub fn value(&self) -> DateTime<FixedOffset> {
        self.0
    }

    /// UTC epoch microseconds. Ordering by this key ignores per-record offsets.
    pub fn sort_key(&self) -> i64 {
        self.0.timestamp_micros()
    }

    /// Calendar year as written in the header (local to its own offset).
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// `M/D/YY` with unpadded month and day, e.g. `3/5/23`.
    pub fn short_format(&self) -> String {
        self.0.format("%-m/%-d/%y").to_string()
    }
}

impl PartialOrd for ParsedDate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParsedDate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// One exported row.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailRecord {
    pub subject: NormalizedHeader,
    pub from: NormalizedHeader,
    pub to: NormalizedHeader,
    pub date: ParsedDate,
}

/// Counters accumulated during a scan.
///
/// `total_seen == included_count + ignored_count`, and the ignored count is
/// the sum of its three reasons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ProcessingStats {
    pub total_seen: u64,
    pub included_count: u64,
    pub ignored_count: u64,
    /// Messages whose date matched no known format.
    pub unresolved_dates: u64,
    /// Messages outside the requested year.
    pub year_mismatches: u64,
    /// Messages whose headers could not be read at all.
    pub malformed: u64,
}

/// Why a message was left out of the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    UnresolvedDate,
    YearMismatch,
    Malformed,
}

impl ProcessingStats {
    pub fn record_included(&mut self) {
        self.total_seen += 1;
        self.included_count += 1;
    }

    pub fn record_ignored(&mut self, reason: IgnoreReason) {
        self.total_seen += 1;
        self.ignored_count += 1;
        match reason {
            IgnoreReason::UnresolvedDate => self.unresolved_dates += 1,
            IgnoreReason::YearMismatch => self.year_mismatches += 1,
            IgnoreReason::Malformed => self.malformed += 1,
        }
    }

    /// Whether all counter invariants hold.
    pub fn is_consistent(&self) -> bool {
        self.total_seen == self.included_count + self.ignored_count
            && self.ignored_count == self.unresolved_dates + self.year_mismatches + self.malformed
    }
}
