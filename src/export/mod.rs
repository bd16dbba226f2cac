//! Export functionality.

pub mod csv;
