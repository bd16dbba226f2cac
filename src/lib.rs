//! `mboxclog`: export the envelope of every message in an MBOX archive to CSV.
//!
//! The archive is scanned once; Subject, From and To are normalized, the
//! `Date:` header is resolved against a table of known formats, messages are
//! optionally filtered by year, and the surviving records are written in
//! chronological order.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;
