//! Raw message header blocks as read from the archive.

use crate::error::{ClogError, Result};

/// One message's header block, borrowed from the archive scan.
///
/// The body is never read; only the bytes between the `From ` separator and
/// the first blank line are kept.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Byte offset of the `From ` separator line inside the MBOX file.
    pub offset: u64,

    /// Total byte length of the message, separator included.
    pub length: u64,

    /// Sequential index within the MBOX (0, 1, 2, …).
    pub sequence: u64,

    /// Raw header bytes, separator line excluded.
    pub headers: Vec<u8>,
}

/// The four envelope headers we export, unfolded but otherwise untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEnvelope {
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<String>,
}

impl RawMessage {
    /// Extract the raw `Subject`, `From`, `To` and `Date` values.
    ///
    /// A header block without a single `Name: value` line is reported as
    /// [`ClogError::MalformedMessage`].
    pub fn envelope(&self) -> Result<RawEnvelope> {
        let text = decode_header_bytes(&self.headers);
        let headers = unfold_headers(&text);

        if headers.is_empty() {
            return Err(ClogError::MalformedMessage {
                offset: self.offset,
                reason: "no header fields found".to_string(),
            });
        }

        Ok(RawEnvelope {
            subject: get_header(&headers, "subject"),
            from: get_header(&headers, "from"),
            to: get_header(&headers, "to"),
            date: get_header(&headers, "date"),
        })
    }
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim();
            // Field names never contain whitespace; such lines are noise.
            if name.is_empty() || name.contains(char::is_whitespace) {
                continue;
            }
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name.to_lowercase(), value));
        }
    }

    result
}

/// Get the first value for a header name (case-insensitive).
fn get_header(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
}
