//! Header normalization: whitespace collapsing and RFC 2047 encoded words.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use tracing::info;

use crate::error::HeaderDecodeError;
use crate::model::record::NormalizedHeader;

/// Encoded words in the wild are not always padded.
const B_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Normalize a raw header value, falling back to the collapsed raw text.
///
/// Never fails. When `verbose` is set, a decode failure is logged.
pub fn normalize(raw: Option<&str>, verbose: bool) -> NormalizedHeader {
    let raw = raw.unwrap_or_default();
    match try_normalize(raw) {
        Ok(header) => header,
        Err(e) => {
            if verbose {
                info!(header = raw, error = %e, "Could not decode header, keeping raw text");
            }
            NormalizedHeader::new(collapse_whitespace(raw))
        }
    }
}

/// Collapse whitespace, decode encoded words, and collapse again.
///
/// `"Re:  Hello   World"` → `"Re: Hello World"`. Applying it to its own
/// output is a no-op, except when a decoded word itself spells out another
/// encoded word: only one layer is decoded per call.
pub fn try_normalize(raw: &str) -> Result<NormalizedHeader, HeaderDecodeError> {
    let collapsed = collapse_whitespace(raw);
    if !collapsed.contains("=?") {
        return Ok(NormalizedHeader::new(collapsed));
    }
    let decoded = decode_encoded_words(&collapsed)?;
    Ok(NormalizedHeader::new(collapse_whitespace(&decoded)))
}

/// Replace every whitespace run with a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Each word is decoded with its own charset, so mixed-charset headers come
/// out as one string. `=?` that does not start a complete word is kept as text.
pub fn decode_encoded_words(input: &str) -> Result<String, HeaderDecodeError> {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two encoded words is not part of the text (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        match split_encoded_word(after_start) {
            Some(word) => {
                result.push_str(&word.decode()?);
                remaining = &after_start[word.consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    Ok(result)
}

struct EncodedWord<'a> {
    charset: &'a str,
    encoding: &'a str,
    text: &'a str,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

/// Split `charset?encoding?encoded_text?=` without decoding it.
fn split_encoded_word(s: &str) -> Option<EncodedWord<'_>> {
    let first_q = s.find('?')?;
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let text = &rest2[..end];

    if charset.is_empty() || encoding.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    Some(EncodedWord {
        charset,
        encoding,
        text,
        consumed: first_q + 1 + second_q + 1 + end + 2,
    })
}

impl EncodedWord<'_> {
    fn decode(&self) -> Result<String, HeaderDecodeError> {
        let bytes = match self.encoding {
            "B" | "b" => B_ENGINE
                .decode(self.text)
                .map_err(|source| HeaderDecodeError::Base64 {
                    word: self.text.to_string(),
                    source,
                })?,
            "Q" | "q" => decode_q_encoding(self.text)
                .ok_or_else(|| HeaderDecodeError::QuotedPrintable(self.text.to_string()))?,
            other => return Err(HeaderDecodeError::UnknownEncoding(other.to_string())),
        };
        decode_charset(self.charset, &bytes)
    }
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Option<Vec<u8>> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => {
                let hex = bytes.get(i + 1..i + 3)?;
                let hex = std::str::from_utf8(hex).ok()?;
                result.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    Some(result)
}

/// Decode bytes using a named charset. RFC 2231 language suffixes are ignored.
fn decode_charset(charset: &str, bytes: &[u8]) -> Result<String, HeaderDecodeError> {
    let label = charset.split('*').next().unwrap_or(charset);
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| HeaderDecodeError::UnknownCharset(charset.to_string()))?;
    let (decoded, _, _) = encoding.decode(bytes);
    Ok(decoded.into_owned())
}
