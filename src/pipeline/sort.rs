//! Chronological ordering of included records.

use crate::model::record::EmailRecord;

/// Sort records ascending by instant. Equal instants keep scan order.
pub fn sort_chronologically(records: &mut [EmailRecord]) {
    // `sort_by_key` is stable.
    records.sort_by_key(|r| r.date.sort_key());
}
