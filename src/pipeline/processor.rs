//! Single forward pass over the archive.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::Result;
use crate::model::message::RawMessage;
use crate::model::record::{EmailRecord, IgnoreReason, NormalizedHeader, ParsedDate, ProcessingStats};
use crate::parser::date::DateResolver;
use crate::parser::header;
use crate::pipeline::filter::{Decision, MessageFilter};

/// A progress diagnostic is logged every this many messages when verbose.
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Default number of messages normalized together on the thread pool.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Records accumulated by a scan, in encounter order, plus counters.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub records: Vec<EmailRecord>,
    pub stats: ProcessingStats,
}

/// Headers of one message after normalization, before filtering.
struct Candidate {
    offset: u64,
    subject: NormalizedHeader,
    from: NormalizedHeader,
    to: NormalizedHeader,
    raw_date: String,
    date: Option<ParsedDate>,
}

/// Drives normalization, date resolution and filtering over a message stream.
pub struct ArchiveProcessor<'a> {
    resolver: &'a DateResolver,
    filter: MessageFilter,
    verbose: bool,
    batch_size: usize,
}

impl<'a> ArchiveProcessor<'a> {
    pub fn new(resolver: &'a DateResolver, filter: MessageFilter, verbose: bool) -> Self {
        Self {
            resolver,
            filter,
            verbose,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Consume `messages` once.
    ///
    /// Per-message problems are counted and logged; only an `Err` yielded by
    /// the stream itself (an archive read failure) aborts the scan.
    /// `progress` receives the running count of messages seen.
    pub fn run<I>(&self, messages: I, progress: Option<&dyn Fn(u64)>) -> Result<ScanOutcome>
    where
        I: IntoIterator<Item = Result<RawMessage>>,
    {
        let mut outcome = ScanOutcome::default();
        let mut messages = messages.into_iter();
        let mut batch: Vec<RawMessage> = Vec::with_capacity(self.batch_size);

        loop {
            batch.clear();
            for message in messages.by_ref().take(self.batch_size) {
                batch.push(message?);
            }
            if batch.is_empty() {
                break;
            }

            // Normalization and date resolution are pure; order is restored by collect().
            let candidates: Vec<Result<Candidate>> = batch
                .par_iter()
                .map(|raw| self.prepare(raw))
                .collect();

            for candidate in candidates {
                self.tally(candidate, &mut outcome);
                if let Some(cb) = progress {
                    cb(outcome.stats.total_seen);
                }
                if self.verbose && outcome.stats.total_seen % PROGRESS_INTERVAL == 0 {
                    info!(
                        seen = outcome.stats.total_seen,
                        included = outcome.stats.included_count,
                        "{} emails processed",
                        outcome.stats.total_seen
                    );
                }
            }
        }

        Ok(outcome)
    }

    fn prepare(&self, raw: &RawMessage) -> Result<Candidate> {
        let envelope = raw.envelope()?;
        let raw_date = envelope.date.unwrap_or_default();
        Ok(Candidate {
            offset: raw.offset,
            subject: header::normalize(envelope.subject.as_deref(), self.verbose),
            from: header::normalize(envelope.from.as_deref(), self.verbose),
            to: header::normalize(envelope.to.as_deref(), self.verbose),
            date: self.resolver.resolve(&raw_date),
            raw_date,
        })
    }

    fn tally(&self, candidate: Result<Candidate>, outcome: &mut ScanOutcome) {
        let candidate = match candidate {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable message");
                outcome.stats.record_ignored(IgnoreReason::Malformed);
                return;
            }
        };

        match self.filter.decide(candidate.date) {
            Decision::Include(date) => {
                outcome.stats.record_included();
                outcome.records.push(EmailRecord {
                    subject: candidate.subject,
                    from: candidate.from,
                    to: candidate.to,
                    date,
                });
            }
            Decision::Exclude(reason) => {
                match reason {
                    IgnoreReason::UnresolvedDate => warn!(
                        offset = candidate.offset,
                        subject = %candidate.subject,
                        date = %candidate.raw_date,
                        "Could not parse date, skipping message"
                    ),
                    IgnoreReason::YearMismatch if self.verbose => info!(
                        offset = candidate.offset,
                        subject = %candidate.subject,
                        date = %candidate.raw_date,
                        "Outside target year, skipping message"
                    ),
                    _ => {}
                }
                outcome.stats.record_ignored(reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClogError;
    use crate::testing::capture_logs;

    fn raw(sequence: u64, headers: &str) -> Result<RawMessage> {
        Ok(RawMessage {
            offset: sequence * 100,
            length: 100,
            sequence,
            headers: headers.as_bytes().to_vec(),
        })
    }

    fn message(sequence: u64, subject: &str, date: &str) -> Result<RawMessage> {
        raw(
            sequence,
            &format!("From: a@example.com\nTo: b@example.com\nSubject: {subject}\nDate: {date}\n"),
        )
    }

    fn scan(messages: Vec<Result<RawMessage>>, year: Option<&str>) -> ScanOutcome {
        let resolver = DateResolver::default();
        let filter = MessageFilter::new(year.map(|y| y.parse().unwrap()));
        ArchiveProcessor::new(&resolver, filter, true)
            .with_batch_size(2)
            .run(messages, None)
            .unwrap()
    }

    #[test]
    fn test_year_filter_counts() {
        let outcome = scan(
            vec![
                message(0, "a", "Tue, 15 Mar 2022 10:00:00 +0000"),
                message(1, "b", "Wed, 02 Nov 2022 16:45:00 +0000"),
                message(2, "c", "Mon, 09 Jan 2023 12:00:00 +0000"),
            ],
            Some("2022"),
        );
        assert_eq!(outcome.stats.total_seen, 3);
        assert_eq!(outcome.stats.included_count, 2);
        assert_eq!(outcome.stats.ignored_count, 1);
        assert_eq!(outcome.stats.year_mismatches, 1);
        assert!(outcome.stats.is_consistent());
        assert!(outcome.records.iter().all(|r| r.date.year() == 2022));
    }

    #[test]
    fn test_unresolved_date_is_ignored() {
        let outcome = scan(
            vec![
                message(0, "good", "Tue, 15 Mar 2022 10:00:00 +0000"),
                message(1, "bad", "sometime last week"),
                raw(2, "Subject: no date at all\n"),
            ],
            None,
        );
        assert_eq!(outcome.stats.included_count, 1);
        assert_eq!(outcome.stats.unresolved_dates, 2);
        assert_eq!(outcome.records[0].subject.as_str(), "good");
        assert!(outcome.stats.is_consistent());
    }

    #[test]
    fn test_malformed_message_is_isolated() {
        let outcome = scan(
            vec![
                raw(0, "garbage without fields\n"),
                message(1, "fine", "Tue, 15 Mar 2022 10:00:00 +0000"),
            ],
            None,
        );
        assert_eq!(outcome.stats.malformed, 1);
        assert_eq!(outcome.stats.included_count, 1);
        assert!(outcome.stats.is_consistent());
    }

    #[test]
    fn test_records_keep_encounter_order_across_batches() {
        let outcome = scan(
            (0..5)
                .map(|i| message(i, &format!("m{i}"), "Tue, 15 Mar 2022 10:00:00 +0000"))
                .collect(),
            None,
        );
        let subjects: Vec<&str> = outcome.records.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_headers_are_normalized() {
        let outcome = scan(
            vec![message(0, "Re:  Hello   World", "Tue, 15 Mar 2022 10:00:00 +0000")],
            None,
        );
        assert_eq!(outcome.records[0].subject.as_str(), "Re: Hello World");
        assert_eq!(outcome.records[0].from.as_str(), "a@example.com");
    }

    #[test]
    fn test_read_error_aborts() {
        let resolver = DateResolver::default();
        let messages = vec![
            message(0, "a", "Tue, 15 Mar 2022 10:00:00 +0000"),
            Err(ClogError::read(
                "archive.mbox",
                std::io::Error::other("disk on fire"),
            )),
        ];
        let result = ArchiveProcessor::new(&resolver, MessageFilter::default(), false)
            .run(messages, None);
        assert!(matches!(result, Err(ClogError::ArchiveRead { .. })));
    }

    #[test]
    fn test_progress_callback_sees_every_message() {
        let resolver = DateResolver::default();
        let seen = std::cell::Cell::new(0);
        let messages = (0..3)
            .map(|i| message(i, "x", "Tue, 15 Mar 2022 10:00:00 +0000"))
            .collect::<Vec<_>>();
        ArchiveProcessor::new(&resolver, MessageFilter::default(), false)
            .run(messages, Some(&|n| seen.set(n)))
            .unwrap();
        assert_eq!(seen.get(), 3);
    }

    #[test]
    fn test_unresolved_date_warning_names_subject_and_raw_date() {
        let logs = capture_logs(|| {
            scan(
                vec![
                    message(0, "good", "Tue, 15 Mar 2022 10:00:00 +0000"),
                    message(1, "bad", "sometime last week"),
                ],
                None,
            );
        });
        let out = logs.contents();
        let line = out
            .lines()
            .find(|l| l.contains("Could not parse date"))
            .expect("unresolved date was not logged");
        assert!(line.contains("WARN"));
        assert!(line.contains("subject=bad"));
        assert!(line.contains("sometime last week"));
        assert_eq!(logs.lines_containing("Could not parse date"), 1);
    }

    #[test]
    fn test_year_mismatch_is_logged_only_when_verbose() {
        let run = |verbose: bool| {
            capture_logs(|| {
                let resolver = DateResolver::default();
                let filter = MessageFilter::new(Some("2022".parse().unwrap()));
                ArchiveProcessor::new(&resolver, filter, verbose)
                    .run(vec![message(0, "old", "Mon, 09 Jan 2023 12:00:00 +0000")], None)
                    .unwrap();
            })
        };
        assert_eq!(run(true).lines_containing("Outside target year"), 1);
        assert_eq!(run(false).lines_containing("Outside target year"), 0);
    }

    #[test]
    fn test_progress_is_logged_every_thousand_messages_when_verbose() {
        let run = |verbose: bool| {
            capture_logs(|| {
                let resolver = DateResolver::default();
                let messages: Vec<_> = (0..PROGRESS_INTERVAL)
                    .map(|i| message(i, "x", "Tue, 15 Mar 2022 10:00:00 +0000"))
                    .collect();
                let outcome = ArchiveProcessor::new(&resolver, MessageFilter::default(), verbose)
                    .run(messages, None)
                    .unwrap();
                assert_eq!(outcome.stats.total_seen, PROGRESS_INTERVAL);
            })
        };
        assert_eq!(run(true).lines_containing("1000 emails processed"), 1);
        assert_eq!(run(false).lines_containing("emails processed"), 0);
    }
}
