//! Inclusion decision for one message.

use std::str::FromStr;

use crate::error::ClogError;
use crate::model::record::{IgnoreReason, ParsedDate};

/// A four-digit calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TargetYear(i32);

impl TargetYear {
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl FromStr for TargetYear {
    type Err = ClogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 4 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ClogError::InvalidYear(s.to_string()));
        }
        trimmed
            .parse()
            .map(Self)
            .map_err(|_| ClogError::InvalidYear(s.to_string()))
    }
}

impl std::fmt::Display for TargetYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Outcome of [`MessageFilter::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Include(ParsedDate),
    Exclude(IgnoreReason),
}

/// Drops messages without a resolved date or outside the target year.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFilter {
    target_year: Option<TargetYear>,
}

impl MessageFilter {
    pub fn new(target_year: Option<TargetYear>) -> Self {
        Self { target_year }
    }

    pub fn target_year(&self) -> Option<TargetYear> {
        self.target_year
    }

    pub fn decide(&self, date: Option<ParsedDate>) -> Decision {
        let Some(date) = date else {
            return Decision::Exclude(IgnoreReason::UnresolvedDate);
        };
        match self.target_year {
            Some(year) if date.year() != year.value() => {
                Decision::Exclude(IgnoreReason::YearMismatch)
            }
            _ => Decision::Include(date),
        }
    }
}
