//! The export pipeline: scan, filter, sort, write.

pub mod filter;
pub mod processor;
pub mod sort;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::export::csv::export_csv;
use crate::parser::date::DateResolver;
use crate::parser::mbox::MboxParser;

use self::filter::{MessageFilter, TargetYear};
use self::processor::ArchiveProcessor;

/// Validated inputs for one run, built by the command-line layer.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// MBOX archive to read.
    pub source: PathBuf,
    /// Only export messages dated in this year.
    pub target_year: Option<TargetYear>,
    /// CSV destination; created or truncated.
    pub output: PathBuf,
    /// Emit per-message diagnostics and progress ticks.
    pub verbose: bool,
}

/// What a finished run reports back.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub target_year: Option<TargetYear>,
    pub stats: crate::model::record::ProcessingStats,
    /// Size of the written CSV in bytes.
    pub output_bytes: u64,
    pub elapsed: Duration,
}

/// Run a full export.
///
/// Configuration is validated and the archive opened before anything is
/// written. The archive is read exactly once and closed before the CSV is
/// created. Only archive and export failures are returned; problems with
/// individual messages are counted in the report.
pub fn run_export(
    job: ExportJob,
    config: &Config,
    progress: Option<&dyn Fn(u64)>,
) -> Result<RunReport> {
    let start = Instant::now();
    let csv_options = config.export.csv_options()?;
    let resolver = DateResolver::with_extra_formats(&config.dates.extra_formats);

    info!(
        source = %job.source.display(),
        output = %job.output.display(),
        year = ?job.target_year.map(|y| y.value()),
        "Beginning export"
    );

    let parser = MboxParser::new(&job.source)?
        .with_read_buffer_size(config.performance.read_buffer_size);

    let mut outcome = {
        let messages = parser.messages()?;
        ArchiveProcessor::new(&resolver, MessageFilter::new(job.target_year), job.verbose)
            .with_batch_size(config.performance.batch_size)
            .run(messages, progress)?
    };

    sort::sort_chronologically(&mut outcome.records);

    let output_bytes = export_csv(&outcome.records, &job.output, &csv_options)?;

    let report = RunReport {
        source: job.source,
        output: job.output,
        target_year: job.target_year,
        stats: outcome.stats,
        output_bytes,
        elapsed: start.elapsed(),
    };

    info!(
        seen = report.stats.total_seen,
        exported = report.stats.included_count,
        ignored = report.stats.ignored_count,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Export finished"
    );

    Ok(report)
}
