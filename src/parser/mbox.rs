//! Streaming MBOX reader.
//!
//! Reads MBOX files line-by-line through a large buffer and yields the header
//! block of each message. Never loads the entire file into memory.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ClogError, Result};
use crate::model::message::RawMessage;

/// Size of the internal read buffer (1 MB for fast sequential reads on modern SSDs).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Streaming MBOX parser.
///
/// Tolerant of:
///
/// - Mixed `\n` and `\r\n` line endings
/// - `From ` lines not preceded by a blank line (logs a warning)
/// - Truncated messages at EOF
/// - UTF-8 BOM at the start of the file
pub struct MboxParser {
    path: PathBuf,
    file_size: u64,
    read_buffer_size: usize,
}

impl MboxParser {
    /// Create a parser for the given MBOX file.
    ///
    /// Verifies that the file exists and is readable, but does NOT validate
    /// that it is actually an MBOX (see [`MboxParser::messages`]).
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClogError::ArchiveNotFound(path.clone())
            } else {
                ClogError::ArchiveOpen {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;
        if metadata.is_dir() {
            return Err(ClogError::InvalidArchive(path));
        }
        Ok(Self {
            path,
            file_size: metadata.len(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        })
    }

    /// Override the read buffer size.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(4096);
        self
    }

    /// Total size of the underlying file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Path to the MBOX file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the file and return a lazy iterator over its messages.
    ///
    /// A non-empty file must start with a `From ` separator line. The
    /// returned iterator owns the file handle; dropping it closes the file.
    pub fn messages(&self) -> Result<Messages> {
        let file = File::open(&self.path).map_err(|e| ClogError::ArchiveOpen {
            path: self.path.clone(),
            source: e,
        })?;
        let mut reader = BufReader::with_capacity(self.read_buffer_size, file);

        let head = reader
            .fill_buf()
            .map_err(|e| ClogError::read(&self.path, e))?;
        if !head.is_empty() && !is_mbox_separator(head) {
            return Err(ClogError::InvalidArchive(self.path.clone()));
        }

        debug!(path = %self.path.display(), size = self.file_size, "Opened MBOX");

        Ok(Messages {
            path: self.path.clone(),
            reader,
            line_buf: Vec::with_capacity(4096),
            current: None,
            offset: 0,
            sequence: 0,
            prev_line_was_empty: true,
            finished: false,
        })
    }
}

/// A message whose separator has been seen but whose end has not.
struct PendingMessage {
    offset: u64,
    sequence: u64,
    headers: Vec<u8>,
    in_headers: bool,
}

impl PendingMessage {
    fn finish(self, end_offset: u64) -> RawMessage {
        RawMessage {
            offset: self.offset,
            length: end_offset - self.offset,
            sequence: self.sequence,
            headers: self.headers,
        }
    }
}

/// Lazy, single-pass sequence of the messages in an MBOX file.
///
/// Yields `Err` once and then stops if the underlying read fails.
pub struct Messages {
    path: PathBuf,
    reader: BufReader<File>,
    // Reused for every line
    line_buf: Vec<u8>,
    current: Option<PendingMessage>,
    offset: u64,
    sequence: u64,
    prev_line_was_empty: bool,
    finished: bool,
}

impl Messages {
    /// Read one line (including its terminator) into `line_buf`.
    /// Returns 0 at EOF.
    fn read_line(&mut self) -> std::io::Result<usize> {
        self.line_buf.clear();
        self.reader.read_until(b'\n', &mut self.line_buf)
    }
}

impl Iterator for Messages {
    type Item = Result<RawMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let line_len = match self.read_line() {
                Ok(0) => {
                    self.finished = true;
                    return self.current.take().map(|m| Ok(m.finish(self.offset)));
                }
                Ok(n) => n as u64,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(ClogError::read(&self.path, e)));
                }
            };

            let mut completed = None;

            if is_mbox_separator(&self.line_buf) {
                if self.current.is_some() && !self.prev_line_was_empty {
                    warn!(
                        offset = self.offset,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                let next = PendingMessage {
                    offset: self.offset,
                    sequence: self.sequence,
                    headers: Vec::with_capacity(4096),
                    in_headers: true,
                };
                self.sequence += 1;
                completed = self.current.replace(next);
            } else if let Some(current) = self.current.as_mut() {
                if current.in_headers {
                    if is_blank_line(&self.line_buf) {
                        current.in_headers = false;
                    } else {
                        current.headers.extend_from_slice(&self.line_buf);
                    }
                }
            }

            self.prev_line_was_empty = is_blank_line(&self.line_buf);
            self.offset += line_len;

            if let Some(done) = completed {
                // The separator line belongs to the next message.
                return Some(Ok(done.finish(self.offset - line_len)));
            }
        }
    }
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    // Skip BOM if present at very start
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_mbox(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    fn collect(contents: &[u8]) -> Vec<RawMessage> {
        let file = write_mbox(contents);
        let parser = MboxParser::new(file.path()).unwrap();
        parser.messages().unwrap().map(|m| m.unwrap()).collect()
    }

    #[test]
    fn test_is_mbox_separator() {
        assert!(is_mbox_separator(
            b"From user@example.com Thu Jan 01 00:00:00 2024\n"
        ));
        assert!(!is_mbox_separator(b"from user@example.com\n")); // lowercase
        assert!(!is_mbox_separator(b">From user@example.com\n")); // escaped
        assert!(!is_mbox_separator(b"Subject: From here\n"));
    }

    #[test]
    fn test_is_mbox_separator_with_bom() {
        let mut line = vec![0xEF, 0xBB, 0xBF];
        line.extend_from_slice(b"From user@example.com Thu Jan 01 00:00:00 2024\n");
        assert!(is_mbox_separator(&line));
    }

    #[test]
    fn test_is_blank_line() {
        assert!(is_blank_line(b"\n"));
        assert!(is_blank_line(b"\r\n"));
        assert!(is_blank_line(b"  \n"));
        assert!(!is_blank_line(b"hello\n"));
    }

    #[test]
    fn test_header_blocks_and_offsets() {
        let data = b"From a@x Mon Jan  1 00:00:00 2024\nSubject: one\n\nbody\n\n\
From b@x Mon Jan  1 00:00:00 2024\r\nSubject: two\r\n\r\nbody\r\n";
        let messages = collect(data);
        assert_eq!(messages.len(), 2);

        assert_eq!(messages[0].offset, 0);
        assert_eq!(messages[0].sequence, 0);
        assert_eq!(messages[0].headers, b"Subject: one\n");

        let second_start = data.windows(7).rposition(|w| w == b"From b@").unwrap() as u64;
        assert_eq!(messages[0].length, second_start);
        assert_eq!(messages[1].offset, second_start);
        assert_eq!(messages[1].sequence, 1);
        assert_eq!(messages[1].headers, b"Subject: two\r\n");
        assert_eq!(messages[1].offset + messages[1].length, data.len() as u64);
    }

    #[test]
    fn test_body_from_line_is_not_header() {
        let data = b"From a@x Mon Jan  1 00:00:00 2024\nSubject: one\n\n>From the body\n";
        let messages = collect(data);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].headers, b"Subject: one\n");
    }

    #[test]
    fn test_truncated_message_at_eof() {
        let messages = collect(b"From a@x Mon Jan  1 00:00:00 2024\nSubject: cut");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].headers, b"Subject: cut");
    }

    #[test]
    fn test_empty_file_yields_nothing() {
        assert!(collect(b"").is_empty());
    }

    #[test]
    fn test_not_an_mbox() {
        let file = write_mbox(b"Subject: hello\n\nThis is not an mbox\n");
        let parser = MboxParser::new(file.path()).unwrap();
        assert!(matches!(
            parser.messages(),
            Err(ClogError::InvalidArchive(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = MboxParser::new("/definitely/not/here.mbox")
            .err()
            .expect("missing file must fail");
        assert!(matches!(err, ClogError::ArchiveNotFound(_)));
        assert!(err.to_string().contains("/definitely/not/here.mbox"));
    }
}
