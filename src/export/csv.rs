//! Export records to CSV.
//!
//! Four columns (Subject, From, To, Date as `M/D/YY`), no header row,
//! fields quoted only when they need it.

use std::io::Write;
use std::path::Path;

use encoding_rs::Encoding;
use tracing::{debug, warn};

use crate::error::{ClogError, Result};
use crate::model::record::EmailRecord;

/// How rows are rendered and encoded.
#[derive(Debug, Clone, Copy)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    /// Prefix UTF-8 output with a BOM (ignored for other encodings).
    pub bom: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            encoding: encoding_rs::UTF_8,
            bom: false,
        }
    }
}

/// Write `records` to `output_path`, replacing any existing file.
///
/// Returns the number of bytes written.
pub fn export_csv(
    records: &[EmailRecord],
    output_path: &Path,
    options: &CsvOptions,
) -> Result<u64> {
    let file =
        std::fs::File::create(output_path).map_err(|e| ClogError::write(output_path, e))?;
    let mut writer = std::io::BufWriter::new(file);
    let written = write_records(records, &mut writer, options)
        .map_err(|e| ClogError::write(output_path, e))?;
    writer
        .flush()
        .map_err(|e| ClogError::write(output_path, e))?;

    debug!(path = %output_path.display(), rows = records.len(), bytes = written, "CSV written");
    Ok(written)
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Write one row per record to `sink`, in order.
///
/// UTF-8 output is streamed straight into `sink`. Other encodings are
/// rendered to memory first and transcoded in one go. Returns the number of
/// bytes written.
pub fn write_records<W: Write>(
    records: &[EmailRecord],
    sink: W,
    options: &CsvOptions,
) -> std::io::Result<u64> {
    let mut sink = CountingWriter::new(sink);

    if options.encoding == encoding_rs::UTF_8 {
        if options.bom {
            sink.write_all(UTF8_BOM)?;
        }
        write_rows(records, &mut sink, options.delimiter)?;
    } else {
        let mut buf = Vec::new();
        write_rows(records, &mut buf, options.delimiter)?;
        let text = String::from_utf8(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let (bytes, _, had_unmappable) = options.encoding.encode(&text);
        if had_unmappable {
            warn!(
                encoding = options.encoding.name(),
                "Some characters cannot be represented and were replaced"
            );
        }
        sink.write_all(&bytes)?;
    }

    sink.flush()?;
    Ok(sink.written)
}

fn write_rows<W: Write>(records: &[EmailRecord], sink: W, delimiter: u8) -> std::io::Result<()> {
    let mut csv = ::csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(::csv::QuoteStyle::Necessary)
        .has_headers(false)
        .from_writer(sink);

    for record in records {
        let date = record.date.short_format();
        csv.write_record([
            record.subject.as_str(),
            record.from.as_str(),
            record.to.as_str(),
            date.as_str(),
        ])?;
    }

    csv.flush()
}

/// Passes writes through and counts the bytes accepted.
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
