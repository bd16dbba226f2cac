//! `Date:` header resolution against an ordered table of known formats.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::model::record::ParsedDate;
use crate::parser::header::collapse_whitespace;

/// One entry of the format table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFormat {
    /// chrono `strftime` pattern; the whole input must match.
    pub pattern: String,

    /// Lower values are tried first.
    pub priority: u16,

    /// The pattern has no offset specifier (e.g. a literal `GMT`);
    /// parse it as a naive date-time and pin it to UTC.
    #[serde(default)]
    pub assume_utc: bool,
}

impl DateFormat {
    pub fn new(pattern: impl Into<String>, priority: u16) -> Self {
        Self {
            pattern: pattern.into(),
            priority,
            assume_utc: false,
        }
    }

    pub fn utc(pattern: impl Into<String>, priority: u16) -> Self {
        Self {
            assume_utc: true,
            ..Self::new(pattern, priority)
        }
    }

    /// Try this single pattern. `None` means "no match", never an error.
    fn try_parse(&self, input: &str) -> Option<DateTime<FixedOffset>> {
        if self.assume_utc {
            NaiveDateTime::parse_from_str(input, &self.pattern)
                .ok()
                .map(|naive| naive.and_utc().fixed_offset())
        } else {
            DateTime::parse_from_str(input, &self.pattern).ok()
        }
    }
}

/// The variants observed in archive exports, most specific first.
///
/// The two-digit-year pattern must precede every `%Y` pattern: `%Y` accepts
/// `22` as the year 22, while `%y` cannot match a four-digit year because
/// the hour that follows needs a colon.
pub fn default_formats() -> Vec<DateFormat> {
    vec![
        DateFormat::new("%a, %d %b %y %H:%M:%S %z", 5),
        DateFormat::new("%a, %d %b %Y %H:%M:%S %z", 10),
        DateFormat::new("%a, %d %b %Y %H:%M:%S %z %Z", 20),
        DateFormat::new("%d %b %Y %H:%M:%S %z", 30),
        DateFormat::new("%a, %d %b %Y %H:%M:%S%.f %z", 40),
        DateFormat::new("%a, %d %b %Y %H:%M %z", 50),
        DateFormat::new("%d %b %Y %H:%M %z", 60),
        DateFormat::new("%a %d %b %Y %H:%M:%S %z", 70),
        DateFormat::utc("%a, %d %b %Y %H:%M:%S GMT", 80),
        DateFormat::utc("%d %b %Y %H:%M:%S GMT", 90),
    ]
}

/// Resolves raw `Date:` values to [`ParsedDate`].
#[derive(Debug, Clone)]
pub struct DateResolver {
    formats: Vec<DateFormat>,
}

impl Default for DateResolver {
    fn default() -> Self {
        Self::new(default_formats())
    }
}

impl DateResolver {
    /// Build a resolver from an arbitrary table. Equal priorities keep their
    /// given order.
    pub fn new(mut formats: Vec<DateFormat>) -> Self {
        formats.sort_by_key(|f| f.priority);
        Self { formats }
    }

    /// The built-in table extended with `extra` entries.
    pub fn with_extra_formats(extra: &[DateFormat]) -> Self {
        let mut formats = default_formats();
        formats.extend_from_slice(extra);
        Self::new(formats)
    }

    /// Formats in the order they are tried.
    pub fn formats(&self) -> &[DateFormat] {
        &self.formats
    }

    /// Return the first strict match, or `None` if every pattern fails.
    pub fn resolve(&self, raw: &str) -> Option<ParsedDate> {
        let cleaned = collapse_whitespace(raw);
        if cleaned.is_empty() {
            return None;
        }
        self.formats
            .iter()
            .find_map(|f| f.try_parse(&cleaned))
            .map(ParsedDate::new)
    }
}
