pub mod config;
pub mod error;
pub mod job;
pub mod models;
pub mod output;
pub mod pacing;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::{OutputConfig, SchedulerConfig};
pub use error::AppError;
pub use job::{JobSnapshot, JobStatus, JobSummary};
pub use models::{ExtractionResult, InputTable, TableFormat};
pub use output::{CatalogSource, OutputStage};
pub use pacing::{PacingConfig, PacingPolicy};
pub use registry::{CancelOutcome, JobRegistry};
pub use scheduler::{BatchScheduler, JobRunner, TracingSchedulerReporter};
pub use service::{JobOutput, JobService};
pub use traits::{ProductExtractor, TableReader, TableWriter};
