//! Centralized error types for mboxclog.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mboxclog library.
#[derive(Error, Debug)]
pub enum ClogError {
    /// The archive does not exist.
    #[error("MBOX file not found: {0}")]
    ArchiveNotFound(PathBuf),

    /// The archive exists but could not be opened.
    #[error("Cannot open MBOX file '{path}': {source}")]
    ArchiveOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file does not start with a `From ` separator line.
    #[error("File does not appear to be a valid MBOX: {0}")]
    InvalidArchive(PathBuf),

    /// Reading the archive failed after the scan started.
    #[error("I/O error reading '{path}': {source}")]
    ArchiveRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A single message could not be interpreted. Never escapes the processor.
    #[error("Malformed message at offset {offset}: {reason}")]
    MalformedMessage { offset: u64, reason: String },

    /// The destination could not be created or written.
    #[error("Cannot write export to '{path}': {source}")]
    ExportWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configured output encoding is not a known label.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// The configured CSV delimiter is not a single ASCII character.
    #[error("Invalid CSV delimiter: {0:?}")]
    InvalidDelimiter(char),

    /// A year filter that is not exactly four digits.
    #[error("Invalid year '{0}': expected four digits, e.g. 2023")]
    InvalidYear(String),
}

/// Convenience alias for `Result<T, ClogError>`.
pub type Result<T> = std::result::Result<T, ClogError>;

impl ClogError {
    /// Create an `ArchiveRead` variant from a path and an `io::Error`.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ArchiveRead {
            path: path.into(),
            source,
        }
    }

    /// Create an `ExportWrite` variant from a path and an `io::Error`.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ExportWrite {
            path: path.into(),
            source,
        }
    }
}

/// Failure to decode an RFC 2047 encoded word.
///
/// Always recovered from: the header falls back to its raw text.
#[derive(Error, Debug)]
pub enum HeaderDecodeError {
    #[error("invalid base64 in encoded word '{word}': {source}")]
    Base64 {
        word: String,
        source: base64::DecodeError,
    },

    #[error("invalid Q-encoding escape in encoded word '{0}'")]
    QuotedPrintable(String),

    #[error("unknown charset '{0}'")]
    UnknownCharset(String),

    #[error("unknown encoded-word encoding '{0}'")]
    UnknownEncoding(String),
}
