//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::models::{
    ExtractionResult, ITEM_CODE_COLUMN, ITEM_NAME_COLUMN, InputTable, SR_NO_COLUMN, TableFormat,
};
use crate::scheduler::{JobRunner, SchedulerEvent, SchedulerReporter, Submission};
use crate::traits::{ProductExtractor, TableReader, TableWriter};

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor with a queue of canned results.
#[derive(Clone)]
pub struct MockExtractor {
    /// Each call pops the first element; once empty, `fallback` is returned.
    responses: Arc<Mutex<Vec<ExtractionResult>>>,
    fallback: ExtractionResult,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockExtractor {
    /// Every call returns `result`.
    pub fn always(result: ExtractionResult) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            fallback: result,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Calls return `responses` in order, then a default successful result.
    pub fn with_responses(responses: Vec<ExtractionResult>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::always(found("default"))
        }
    }

    /// Sleep for `delay` before answering (timeout / cancellation tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Item names looked up so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProductExtractor for MockExtractor {
    async fn extract(&self, item_name: &str) -> ExtractionResult {
        self.calls.lock().unwrap().push(item_name.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            self.fallback.clone()
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockTableReader
// ---------------------------------------------------------------------------

/// Mock reader returning a fixed table or a one-shot error.
#[derive(Clone)]
pub struct MockTableReader {
    table: InputTable,
    error: Arc<Mutex<Option<AppError>>>,
    pub reads: Arc<Mutex<Vec<(PathBuf, TableFormat)>>>,
}

impl MockTableReader {
    pub fn new(table: InputTable) -> Self {
        Self {
            table,
            error: Arc::new(Mutex::new(None)),
            reads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
            ..Self::new(InputTable::default())
        }
    }
}

impl TableReader for MockTableReader {
    async fn read_table(&self, path: &Path, format: TableFormat) -> Result<InputTable, AppError> {
        self.reads
            .lock()
            .unwrap()
            .push((path.to_path_buf(), format));
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self.table.clone())
    }
}

// ---------------------------------------------------------------------------
// MockTableWriter
// ---------------------------------------------------------------------------

/// One recorded `write_table` call.
#[derive(Debug, Clone)]
pub struct WrittenTable {
    pub path: PathBuf,
    pub format: TableFormat,
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

/// Mock writer that records tables and touches the target file.
#[derive(Clone)]
pub struct MockTableWriter {
    pub written: Arc<Mutex<Vec<WrittenTable>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockTableWriter {
    pub fn new() -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Writer whose next call fails with `error`.
    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
            ..Self::new()
        }
    }
}

impl Default for MockTableWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TableWriter for MockTableWriter {
    async fn write_table(
        &self,
        path: &Path,
        format: TableFormat,
        headers: Vec<String>,
        records: Vec<Vec<String>>,
    ) -> Result<(), AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        std::fs::write(path, records.len().to_string())?;
        self.written.lock().unwrap().push(WrittenTable {
            path: path.to_path_buf(),
            format,
            headers,
            records,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock scheduler reporter that records event names and pause lengths.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
    retry_delays: Arc<Mutex<Vec<Duration>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == name)
            .count()
    }

    /// Backoff delays announced before each retry.
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays.lock().unwrap().clone()
    }
}

impl SchedulerReporter for MockReporter {
    fn report(&self, event: SchedulerEvent<'_>) {
        if let SchedulerEvent::RetryScheduled { delay, .. } = &event {
            self.retry_delays.lock().unwrap().push(*delay);
        }
        self.events.lock().unwrap().push(event.name().to_string());
    }
}

// ---------------------------------------------------------------------------
// MockJobRunner
// ---------------------------------------------------------------------------

/// Runner that records submissions instead of processing them.
#[derive(Clone, Default)]
pub struct MockJobRunner {
    pub submissions: Arc<Mutex<Vec<Submission>>>,
}

impl MockJobRunner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobRunner for MockJobRunner {
    fn spawn(&self, submission: Submission) {
        self.submissions.lock().unwrap().push(submission);
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// A successful lookup with just a title set.
pub fn found(title: &str) -> ExtractionResult {
    ExtractionResult {
        title: Some(title.to_string()),
        discontinued: Some(false),
        ..ExtractionResult::default()
    }
}

/// Input table with the standard identifying columns, one row per name.
pub fn table(item_names: &[&str]) -> InputTable {
    InputTable {
        headers: vec![
            SR_NO_COLUMN.to_string(),
            ITEM_CODE_COLUMN.to_string(),
            ITEM_NAME_COLUMN.to_string(),
        ],
        rows: item_names
            .iter()
            .enumerate()
            .map(|(i, name)| vec![(i + 1).to_string(), format!("C{:03}", i + 1), name.to_string()])
            .collect(),
    }
}
