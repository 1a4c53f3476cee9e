use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::output::CatalogSource;
use crate::pacing::{DelayRange, PacingConfig};

/// Configuration for a batch scheduler run.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Rows processed before the longer inter-batch pause.
    pub batch_size: usize,
    /// Retries after the first failed attempt for one item.
    pub max_retries: u32,
    /// Upper bound on a single extraction attempt.
    pub extraction_timeout: Duration,
    pub pacing: PacingConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_retries: 3,
            extraction_timeout: Duration::from_secs(60),
            pacing: PacingConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Read configuration from environment variables, falling back to defaults.
    ///
    /// - `ENRICHER_BATCH_SIZE` (default 5, must be at least 1)
    /// - `ENRICHER_MAX_RETRIES` (default 3)
    /// - `ENRICHER_EXTRACTION_TIMEOUT_SECS` (default 60)
    /// - `ENRICHER_ITEM_DELAY_MIN_SECS` / `ENRICHER_ITEM_DELAY_MAX_SECS` (10 / 20)
    /// - `ENRICHER_BATCH_DELAY_MIN_SECS` / `ENRICHER_BATCH_DELAY_MAX_SECS` (30 / 60)
    /// - `ENRICHER_RETRY_BASE_DELAY_SECS` (default 5)
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let batch_size = env_or("ENRICHER_BATCH_SIZE", defaults.batch_size)?;
        let max_retries = env_or("ENRICHER_MAX_RETRIES", defaults.max_retries)?;
        let timeout_secs = env_or(
            "ENRICHER_EXTRACTION_TIMEOUT_SECS",
            defaults.extraction_timeout.as_secs(),
        )?;

        let item_delay = DelayRange::new(
            secs_or("ENRICHER_ITEM_DELAY_MIN_SECS", defaults.pacing.item_delay.min)?,
            secs_or("ENRICHER_ITEM_DELAY_MAX_SECS", defaults.pacing.item_delay.max)?,
        )?;
        let batch_delay = DelayRange::new(
            secs_or("ENRICHER_BATCH_DELAY_MIN_SECS", defaults.pacing.batch_delay.min)?,
            secs_or("ENRICHER_BATCH_DELAY_MAX_SECS", defaults.pacing.batch_delay.max)?,
        )?;
        let retry_base_delay = secs_or(
            "ENRICHER_RETRY_BASE_DELAY_SECS",
            defaults.pacing.retry_base_delay,
        )?;

        let config = Self {
            batch_size,
            max_retries,
            extraction_timeout: Duration::from_secs(timeout_secs),
            pacing: PacingConfig {
                item_delay,
                batch_delay,
                retry_base_delay,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_extraction_timeout(mut self, timeout: Duration) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_size == 0 {
            return Err(AppError::ConfigError(
                "ENRICHER_BATCH_SIZE must be at least 1".into(),
            ));
        }
        if self.extraction_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "ENRICHER_EXTRACTION_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        self.pacing.validate()
    }
}

/// Where and how result files are written.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    pub source: CatalogSource,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output_files"),
            source: CatalogSource::default(),
        }
    }
}

impl OutputConfig {
    /// - `ENRICHER_OUTPUT_DIR` (default `output_files`)
    /// - `ENRICHER_SOURCE_DOMAIN` / `ENRICHER_SOURCE_LABEL` (`amazon.in` / `Amazon`)
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();
        let output_dir = std::env::var("ENRICHER_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);
        let domain =
            std::env::var("ENRICHER_SOURCE_DOMAIN").unwrap_or(defaults.source.domain);
        let label = std::env::var("ENRICHER_SOURCE_LABEL").unwrap_or(defaults.source.label);

        if domain.trim().is_empty() || label.trim().is_empty() {
            return Err(AppError::ConfigError(
                "ENRICHER_SOURCE_DOMAIN and ENRICHER_SOURCE_LABEL must not be empty".into(),
            ));
        }

        Ok(Self {
            output_dir,
            source: CatalogSource { domain, label },
        })
    }
}

/// Parse an optional environment variable, using `default` when unset.
pub fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigError(format!("Invalid {name} '{raw}': expected a number"))
        }),
    }
}

fn secs_or(name: &str, default: Duration) -> Result<Duration, AppError> {
    env_or(name, default.as_secs()).map(Duration::from_secs)
}
