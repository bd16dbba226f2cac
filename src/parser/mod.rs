//! Archive reading and header interpretation: MBOX streaming, header
//! normalization, and date resolution.

pub mod date;
pub mod header;
pub mod mbox;
