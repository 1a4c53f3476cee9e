use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::error::AppError;
use crate::models::{ColumnMap, ExtractionResult, InputTable, OutputRow, TableFormat};
use crate::output::OutputStage;
use crate::pacing::PacingPolicy;
use crate::registry::JobRegistry;
use crate::traits::{ProductExtractor, TableReader, TableWriter};

/// Everything a scheduler needs to run one accepted upload.
#[derive(Debug, Clone)]
pub struct Submission {
    pub job_id: String,
    pub file_name: String,
    pub input_path: PathBuf,
    pub format: TableFormat,
    /// Delete `input_path` once it has been parsed (uploaded temp files).
    pub remove_input: bool,
    pub cancel: CancellationToken,
}

/// Why the scheduler is sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseKind {
    BetweenItems,
    BetweenBatches,
}

/// Events emitted by the scheduler for monitoring/logging.
#[derive(Debug, Clone)]
pub enum SchedulerEvent<'a> {
    JobStarted {
        job_id: &'a str,
        file_name: &'a str,
    },
    InputLoaded {
        job_id: &'a str,
        rows: usize,
    },
    InputFailed {
        job_id: &'a str,
        error: &'a str,
    },
    BatchStarted {
        job_id: &'a str,
        batch: usize,
        rows: usize,
    },
    ItemSkipped {
        job_id: &'a str,
        row: usize,
    },
    RetryScheduled {
        job_id: &'a str,
        item_name: &'a str,
        attempt: u32,
        delay: Duration,
        error: &'a str,
    },
    RetriesExhausted {
        job_id: &'a str,
        item_name: &'a str,
        error: &'a str,
    },
    ItemProcessed {
        job_id: &'a str,
        processed: usize,
        total: usize,
        failed: bool,
    },
    Pausing {
        job_id: &'a str,
        kind: PauseKind,
        delay: Duration,
    },
    JobCompleted {
        job_id: &'a str,
        output: &'a Path,
    },
    JobFailed {
        job_id: &'a str,
        error: &'a str,
    },
}

impl SchedulerEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::JobStarted { .. } => "job_started",
            Self::InputLoaded { .. } => "input_loaded",
            Self::InputFailed { .. } => "input_failed",
            Self::BatchStarted { .. } => "batch_started",
            Self::ItemSkipped { .. } => "item_skipped",
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::ItemProcessed { .. } => "item_processed",
            Self::Pausing { .. } => "pausing",
            Self::JobCompleted { .. } => "job_completed",
            Self::JobFailed { .. } => "job_failed",
        }
    }
}

/// Trait for receiving scheduler events (decoupled logging).
pub trait SchedulerReporter: Send + Sync {
    fn report(&self, event: SchedulerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSchedulerReporter;

impl SchedulerReporter for TracingSchedulerReporter {
    fn report(&self, event: SchedulerEvent<'_>) {
        match event {
            SchedulerEvent::JobStarted { job_id, file_name } => {
                tracing::info!(%job_id, %file_name, "Job started");
            }
            SchedulerEvent::InputLoaded { job_id, rows } => {
                tracing::info!(%job_id, %rows, "Input loaded");
            }
            SchedulerEvent::InputFailed { job_id, error } => {
                tracing::warn!(%job_id, %error, "Input could not be read");
            }
            SchedulerEvent::BatchStarted { job_id, batch, rows } => {
                tracing::debug!(%job_id, %batch, %rows, "Batch started");
            }
            SchedulerEvent::ItemSkipped { job_id, row } => {
                tracing::info!(%job_id, %row, "Skipping row with empty item name");
            }
            SchedulerEvent::RetryScheduled {
                job_id,
                item_name,
                attempt,
                delay,
                error,
            } => {
                tracing::warn!(
                    %job_id, %item_name, %attempt, delay_secs = delay.as_secs_f64(), %error,
                    "Extraction failed, retrying"
                );
            }
            SchedulerEvent::RetriesExhausted {
                job_id,
                item_name,
                error,
            } => {
                tracing::warn!(%job_id, %item_name, %error, "Giving up on item");
            }
            SchedulerEvent::ItemProcessed {
                job_id,
                processed,
                total,
                failed,
            } => {
                tracing::info!(%job_id, %processed, %total, %failed, "Item processed");
            }
            SchedulerEvent::Pausing {
                job_id,
                kind,
                delay,
            } => {
                tracing::debug!(%job_id, ?kind, delay_secs = delay.as_secs_f64(), "Pausing");
            }
            SchedulerEvent::JobCompleted { job_id, output } => {
                tracing::info!(%job_id, output = %output.display(), "Job completed");
            }
            SchedulerEvent::JobFailed { job_id, error } => {
                tracing::error!(%job_id, %error, "Job failed");
            }
        }
    }
}

/// Starts a submission in the background.
pub trait JobRunner: Send + Sync {
    fn spawn(&self, submission: Submission);
}

/// Drives one job from input file to result file, pacing catalog lookups
/// and recording progress in the registry.
#[derive(Clone)]
pub struct BatchScheduler<E, R, W>
where
    E: ProductExtractor,
    R: TableReader,
    W: TableWriter,
{
    extractor: E,
    reader: R,
    output: OutputStage<W>,
    registry: JobRegistry,
    pacing: PacingPolicy,
    config: SchedulerConfig,
}

impl<E, R, W> BatchScheduler<E, R, W>
where
    E: ProductExtractor,
    R: TableReader,
    W: TableWriter,
{
    pub fn new(
        extractor: E,
        reader: R,
        output: OutputStage<W>,
        registry: JobRegistry,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            extractor,
            reader,
            output,
            registry,
            pacing: PacingPolicy::new(config.pacing.clone()),
            config,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Run a registered job to a terminal state.
    ///
    /// The outcome is always recorded in the registry; the returned value
    /// mirrors it for in-process callers.
    pub async fn run<SR: SchedulerReporter>(
        &self,
        submission: Submission,
        reporter: &SR,
    ) -> Result<PathBuf, AppError> {
        let job_id = submission.job_id.as_str();
        reporter.report(SchedulerEvent::JobStarted {
            job_id,
            file_name: &submission.file_name,
        });

        let outcome = self.execute(&submission, reporter).await;
        match &outcome {
            Ok(path) => {
                self.registry.complete(job_id, path.clone());
                reporter.report(SchedulerEvent::JobCompleted {
                    job_id,
                    output: path,
                });
            }
            Err(e) => {
                let error = e.to_string();
                self.registry.fail(job_id, &error);
                reporter.report(SchedulerEvent::JobFailed {
                    job_id,
                    error: &error,
                });
            }
        }
        outcome
    }

    async fn execute<SR: SchedulerReporter>(
        &self,
        submission: &Submission,
        reporter: &SR,
    ) -> Result<PathBuf, AppError> {
        let job_id = submission.job_id.as_str();
        let cancel = &submission.cancel;

        let table = match self.load_input(submission).await {
            Ok(table) => table,
            Err(e) => {
                let error = e.to_string();
                reporter.report(SchedulerEvent::InputFailed {
                    job_id,
                    error: &error,
                });
                return Err(e);
            }
        };

        let columns = ColumnMap::resolve(&table.headers);
        let total = table.rows.len();
        self.registry.set_total(job_id, total);
        reporter.report(SchedulerEvent::InputLoaded {
            job_id,
            rows: total,
        });

        let batch_size = self.config.batch_size.max(1);
        let batch_count = total.div_ceil(batch_size);
        let mut rows = Vec::with_capacity(total);

        for (batch_idx, batch) in table.rows.chunks(batch_size).enumerate() {
            reporter.report(SchedulerEvent::BatchStarted {
                job_id,
                batch: batch_idx + 1,
                rows: batch.len(),
            });

            for raw in batch {
                let item = columns.item(raw);
                let position = rows.len() + 1;

                if item.is_skippable() {
                    reporter.report(SchedulerEvent::ItemSkipped {
                        job_id,
                        row: position,
                    });
                    rows.push(OutputRow::skipped(item));
                    self.registry.advance(job_id);
                    continue;
                }

                let result = self
                    .extract_with_retry(job_id, item.lookup_name(), cancel, reporter)
                    .await?;
                let failed = result.is_failure();
                rows.push(OutputRow::extracted(item, result));
                self.registry.advance(job_id);
                reporter.report(SchedulerEvent::ItemProcessed {
                    job_id,
                    processed: position,
                    total,
                    failed,
                });

                if position < total {
                    let delay = self.pacing.inter_item_delay();
                    self.pause(job_id, PauseKind::BetweenItems, delay, cancel, reporter)
                        .await?;
                }
            }

            if batch_idx + 1 < batch_count {
                let delay = self.pacing.inter_batch_delay();
                self.pause(job_id, PauseKind::BetweenBatches, delay, cancel, reporter)
                    .await?;
            }
        }

        self.output.write(job_id, submission.format, &rows).await
    }

    /// Parse the input, then drop the uploaded temp file whatever the outcome.
    async fn load_input(&self, submission: &Submission) -> Result<InputTable, AppError> {
        let table = self
            .reader
            .read_table(&submission.input_path, submission.format)
            .await;

        if submission.remove_input {
            if let Err(e) = tokio::fs::remove_file(&submission.input_path).await {
                tracing::warn!(
                    job_id = %submission.job_id,
                    path = %submission.input_path.display(),
                    error = %e,
                    "Failed to remove uploaded file"
                );
            }
        }

        let table = table?;
        if table.rows.is_empty() {
            return Err(AppError::InputError(format!(
                "{} contains no data rows",
                submission.file_name
            )));
        }
        Ok(table)
    }

    /// Look up one item, retrying failed attempts with linear backoff.
    ///
    /// Returns the last failed result once retries are exhausted; only
    /// cancellation ends the loop with an `Err`.
    async fn extract_with_retry<SR: SchedulerReporter>(
        &self,
        job_id: &str,
        item_name: &str,
        cancel: &CancellationToken,
        reporter: &SR,
    ) -> Result<ExtractionResult, AppError> {
        let mut retries = 0;
        loop {
            let result = self.attempt(item_name, cancel).await?;
            if !result.is_failure() {
                return Ok(result);
            }

            let error = result.error.as_deref().unwrap_or_default();
            if retries >= self.config.max_retries {
                reporter.report(SchedulerEvent::RetriesExhausted {
                    job_id,
                    item_name,
                    error,
                });
                return Ok(result);
            }

            retries += 1;
            let delay = self.pacing.retry_backoff(retries);
            reporter.report(SchedulerEvent::RetryScheduled {
                job_id,
                item_name,
                attempt: retries,
                delay,
                error,
            });
            sleep_or_cancel(delay, cancel).await?;
        }
    }

    async fn attempt(
        &self,
        item_name: &str,
        cancel: &CancellationToken,
    ) -> Result<ExtractionResult, AppError> {
        let timeout = self.config.extraction_timeout;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AppError::Cancelled),
            res = tokio::time::timeout(timeout, self.extractor.extract(item_name)) => {
                Ok(res.unwrap_or_else(|_| {
                    ExtractionResult::failed(AppError::Timeout(timeout.as_secs()).to_string())
                }))
            }
        }
    }

    async fn pause<SR: SchedulerReporter>(
        &self,
        job_id: &str,
        kind: PauseKind,
        delay: Duration,
        cancel: &CancellationToken,
        reporter: &SR,
    ) -> Result<(), AppError> {
        reporter.report(SchedulerEvent::Pausing {
            job_id,
            kind,
            delay,
        });
        sleep_or_cancel(delay, cancel).await
    }
}

async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<(), AppError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AppError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

impl<E, R, W> JobRunner for BatchScheduler<E, R, W>
where
    E: ProductExtractor,
    R: TableReader,
    W: TableWriter,
{
    fn spawn(&self, submission: Submission) {
        let scheduler = self.clone();
        let registry = self.registry.clone();
        let job_id = submission.job_id.clone();

        let run = tokio::spawn(async move {
            // Outcome is recorded in the registry.
            let _ = scheduler.run(submission, &TracingSchedulerReporter).await;
        });

        // A panicking run never reaches `fail`, so record it here.
        tokio::spawn(async move {
            if let Err(e) = run.await {
                let error = if e.is_panic() {
                    "Job panicked"
                } else {
                    "Job aborted"
                };
                tracing::error!(%job_id, cause = %e, "Job task ended abnormally");
                registry.fail(&job_id, error);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputConfig;
    use crate::job::JobStatus;
    use crate::output::OUTPUT_COLUMNS;
    use crate::pacing::PacingConfig;
    use crate::testutil::{
        MockExtractor, MockReporter, MockTableReader, MockTableWriter, found, table,
    };
    use tokio::time::Instant;

    struct Harness {
        scheduler: BatchScheduler<MockExtractor, MockTableReader, MockTableWriter>,
        extractor: MockExtractor,
        writer: MockTableWriter,
        registry: JobRegistry,
        _dir: tempfile::TempDir,
    }

    fn harness(
        extractor: MockExtractor,
        reader: MockTableReader,
        writer: MockTableWriter,
        config: SchedulerConfig,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let registry = JobRegistry::new();
        let output = OutputStage::new(
            writer.clone(),
            OutputConfig {
                output_dir: dir.path().to_path_buf(),
                ..Default::default()
            },
        );
        let scheduler = BatchScheduler::new(
            extractor.clone(),
            reader,
            output,
            registry.clone(),
            config,
        );
        Harness {
            scheduler,
            extractor,
            writer,
            registry,
            _dir: dir,
        }
    }

    fn quick_config() -> SchedulerConfig {
        SchedulerConfig::default().with_pacing(PacingConfig::immediate())
    }

    fn submit(registry: &JobRegistry, job_id: &str) -> Submission {
        let cancel = registry.create(job_id, "items.csv").unwrap();
        Submission {
            job_id: job_id.to_string(),
            file_name: "items.csv".to_string(),
            input_path: PathBuf::from("items.csv"),
            format: TableFormat::Csv,
            remove_input: false,
            cancel,
        }
    }

    #[tokio::test]
    async fn empty_item_name_is_skipped_without_lookup() {
        let h = harness(
            MockExtractor::always(found("Crocin")),
            MockTableReader::new(table(&["crocin", "", "dolo"])),
            MockTableWriter::new(),
            quick_config(),
        );
        let submission = submit(&h.registry, "job1");

        h.scheduler
            .run(submission, &MockReporter::default())
            .await
            .unwrap();

        let snap = h.registry.snapshot("job1").unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.total, 3);
        assert_eq!(snap.processed, 3);
        assert_eq!(h.extractor.calls(), vec!["crocin", "dolo"]);

        let written = h.writer.written.lock().unwrap();
        let records = &written[0].records;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0][2], "crocin");
        assert_eq!(records[1][2], "");
        assert!(records[1][3..OUTPUT_COLUMNS].iter().all(String::is_empty));
        assert_eq!(records[2][2], "dolo");
        assert_eq!(records[2][3], "Crocin");
    }

    #[tokio::test(start_paused = true)]
    async fn failures_within_budget_then_success() {
        let h = harness(
            MockExtractor::with_responses(vec![
                ExtractionResult::failed("captcha"),
                ExtractionResult::failed("captcha"),
                found("Dolo 650"),
            ]),
            MockTableReader::new(table(&["dolo"])),
            MockTableWriter::new(),
            SchedulerConfig::default().with_pacing(
                PacingConfig::immediate().with_retry_base_delay(Duration::from_secs(5)),
            ),
        );
        let reporter = MockReporter::default();
        let submission = submit(&h.registry, "job1");

        let start = Instant::now();
        h.scheduler.run(submission, &reporter).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(
            reporter.retry_delays(),
            vec![Duration::from_secs(5), Duration::from_secs(10)]
        );
        assert!(elapsed >= Duration::from_secs(15));
        assert!(elapsed < Duration::from_secs(16));
        assert_eq!(h.extractor.calls().len(), 3);

        let written = h.writer.written.lock().unwrap();
        assert_eq!(written[0].records[0][3], "Dolo 650");
        assert_eq!(written[0].records[0][20], "");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_keep_last_error() {
        let h = harness(
            MockExtractor::with_responses(vec![
                ExtractionResult::failed("attempt 1"),
                ExtractionResult::failed("attempt 2"),
                ExtractionResult::failed("attempt 3"),
                ExtractionResult::failed("attempt 4"),
            ]),
            MockTableReader::new(table(&["dolo", "crocin"])),
            MockTableWriter::new(),
            quick_config(),
        );
        let reporter = MockReporter::default();
        let submission = submit(&h.registry, "job1");

        h.scheduler.run(submission, &reporter).await.unwrap();

        // 1 attempt + 3 retries for "dolo", then the default success for "crocin".
        assert_eq!(h.extractor.calls().len(), 5);
        assert_eq!(reporter.count("retries_exhausted"), 1);

        let snap = h.registry.snapshot("job1").unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.processed, 2);

        let written = h.writer.written.lock().unwrap();
        assert_eq!(written[0].records[0][20], "attempt 4");
        assert_eq!(written[0].records[1][20], "");
    }

    #[tokio::test]
    async fn unreadable_input_fails_job_before_any_row() {
        let h = harness(
            MockExtractor::always(found("x")),
            MockTableReader::with_error(AppError::InputError("bad zip archive".into())),
            MockTableWriter::new(),
            quick_config(),
        );
        let reporter = MockReporter::default();
        let submission = submit(&h.registry, "job1");

        let err = h.scheduler.run(submission, &reporter).await.unwrap_err();
        assert!(matches!(err, AppError::InputError(_)));

        let snap = h.registry.snapshot("job1").unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.total, 0);
        assert_eq!(snap.processed, 0);
        assert!(snap.error.unwrap().contains("bad zip archive"));
        assert!(h.extractor.calls().is_empty());
        assert!(h.writer.written.lock().unwrap().is_empty());
        assert_eq!(reporter.count("input_failed"), 1);
    }

    #[tokio::test]
    async fn input_without_rows_fails_job() {
        let h = harness(
            MockExtractor::always(found("x")),
            MockTableReader::new(table(&[])),
            MockTableWriter::new(),
            quick_config(),
        );
        let submission = submit(&h.registry, "job1");

        h.scheduler
            .run(submission, &MockReporter::default())
            .await
            .unwrap_err();

        let snap = h.registry.snapshot("job1").unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert!(snap.error.unwrap().contains("no data rows"));
    }

    #[tokio::test]
    async fn output_failure_fails_completed_rows() {
        let h = harness(
            MockExtractor::always(found("x")),
            MockTableReader::new(table(&["a", "b"])),
            MockTableWriter::with_error(AppError::Generic("disk full".into())),
            quick_config(),
        );
        let submission = submit(&h.registry, "job1");

        h.scheduler
            .run(submission, &MockReporter::default())
            .await
            .unwrap_err();

        let snap = h.registry.snapshot("job1").unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.processed, snap.total);
        assert!(snap.error.unwrap().contains("disk full"));
        assert_eq!(snap.output_file, None);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_between_items_and_batches() {
        let h = harness(
            MockExtractor::always(found("x")),
            MockTableReader::new(table(&["a", "b", "c"])),
            MockTableWriter::new(),
            SchedulerConfig::default().with_batch_size(2).with_pacing(
                PacingConfig::immediate()
                    .with_item_delay(Duration::from_secs(10), Duration::from_secs(10))
                    .with_batch_delay(Duration::from_secs(30), Duration::from_secs(30)),
            ),
        );
        let reporter = MockReporter::default();
        let submission = submit(&h.registry, "job1");

        let start = Instant::now();
        h.scheduler.run(submission, &reporter).await.unwrap();
        let elapsed = start.elapsed();

        // Item pauses after rows 1 and 2 (none after the last), one batch pause.
        assert_eq!(reporter.count("pausing"), 3);
        assert!(elapsed >= Duration::from_secs(50));
        assert!(elapsed < Duration::from_secs(51));
        assert_eq!(reporter.count("batch_started"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookup_times_out_as_row_error() {
        let h = harness(
            MockExtractor::always(found("x")).with_delay(Duration::from_secs(120)),
            MockTableReader::new(table(&["slow"])),
            MockTableWriter::new(),
            quick_config()
                .with_max_retries(0)
                .with_extraction_timeout(Duration::from_secs(60)),
        );
        let submission = submit(&h.registry, "job1");

        h.scheduler
            .run(submission, &MockReporter::default())
            .await
            .unwrap();

        let written = h.writer.written.lock().unwrap();
        assert_eq!(written[0].records[0][20], "Timed out after 60 seconds");
        assert_eq!(
            h.registry.snapshot("job1").unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_lookup_fails_job() {
        let h = harness(
            MockExtractor::always(found("x")).with_delay(Duration::from_secs(30)),
            MockTableReader::new(table(&["a", "b"])),
            MockTableWriter::new(),
            quick_config(),
        );
        let submission = submit(&h.registry, "job1");
        let cancel = submission.cancel.clone();

        let scheduler = h.scheduler.clone();
        let handle = tokio::spawn(async move {
            let reporter = MockReporter::default();
            scheduler.run(submission, &reporter).await
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, AppError::Cancelled));

        let snap = h.registry.snapshot("job1").unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.error.as_deref(), Some("Job cancelled"));
        assert!(h.writer.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookup_uses_trimmed_name_but_output_keeps_cell_text() {
        let input = InputTable {
            headers: vec!["Item Name".into()],
            rows: vec![vec!["  Crocin 500 ".into()]],
        };
        let h = harness(
            MockExtractor::always(found("Crocin")),
            MockTableReader::new(input),
            MockTableWriter::new(),
            quick_config(),
        );
        let submission = submit(&h.registry, "job1");

        h.scheduler
            .run(submission, &MockReporter::default())
            .await
            .unwrap();

        assert_eq!(h.extractor.calls(), vec!["Crocin 500"]);
        let written = h.writer.written.lock().unwrap();
        assert_eq!(written[0].records[0][2], "  Crocin 500 ");
    }

    #[tokio::test]
    async fn missing_item_name_column_skips_every_row() {
        let input = InputTable {
            headers: vec!["SrNo".into(), "Product".into()],
            rows: vec![vec!["1".into(), "crocin".into()]],
        };
        let h = harness(
            MockExtractor::always(found("x")),
            MockTableReader::new(input),
            MockTableWriter::new(),
            quick_config(),
        );
        let submission = submit(&h.registry, "job1");

        h.scheduler
            .run(submission, &MockReporter::default())
            .await
            .unwrap();

        assert!(h.extractor.calls().is_empty());
        let written = h.writer.written.lock().unwrap();
        assert_eq!(written[0].records[0][0], "1");
        assert_eq!(written[0].records[0][1], "NA");
    }

    #[tokio::test]
    async fn uploaded_input_is_removed_after_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("upload.csv");
        std::fs::write(&upload, "Item Name\ncrocin\n").unwrap();

        let h = harness(
            MockExtractor::always(found("x")),
            MockTableReader::with_error(AppError::InputError("unparseable".into())),
            MockTableWriter::new(),
            quick_config(),
        );
        let mut submission = submit(&h.registry, "job1");
        submission.input_path = upload.clone();
        submission.remove_input = true;

        h.scheduler
            .run(submission, &MockReporter::default())
            .await
            .unwrap_err();

        assert!(!upload.exists());
    }

    #[tokio::test]
    async fn spawned_run_reports_through_registry() {
        let h = harness(
            MockExtractor::always(found("x")),
            MockTableReader::new(table(&["a"])),
            MockTableWriter::new(),
            quick_config(),
        );
        let submission = submit(&h.registry, "job1");

        h.scheduler.spawn(submission);

        for _ in 0..100 {
            if h.registry.snapshot("job1").unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let snap = h.registry.snapshot("job1").unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert!(snap.output_file.unwrap().ends_with("output_job1.csv"));
    }

    #[derive(Clone)]
    struct PanickingExtractor;

    impl ProductExtractor for PanickingExtractor {
        async fn extract(&self, _item_name: &str) -> ExtractionResult {
            panic!("extractor bug");
        }
    }

    #[tokio::test]
    async fn panicking_run_marks_job_failed() {
        let dir = tempfile::tempdir().unwrap();
        let registry = JobRegistry::new();
        let output = OutputStage::new(
            MockTableWriter::new(),
            OutputConfig {
                output_dir: dir.path().to_path_buf(),
                ..Default::default()
            },
        );
        let scheduler = BatchScheduler::new(
            PanickingExtractor,
            MockTableReader::new(table(&["a"])),
            output,
            registry.clone(),
            quick_config(),
        );
        let submission = submit(&registry, "job1");

        scheduler.spawn(submission);

        for _ in 0..100 {
            if registry.snapshot("job1").unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let snap = registry.snapshot("job1").unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.error.as_deref(), Some("Job panicked"));
    }
}
