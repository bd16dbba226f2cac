//! Core data model: raw header blocks, normalized records, and scan counters.

pub mod message;
pub mod record;
