//! Human-paced delays between catalog lookups.
//!
//! The remote catalog is an uncooperative third party: looking up items
//! back-to-back gets the client blocked. [`PacingPolicy`] spaces lookups with
//! a uniformly random pause between items, a longer pause between batches,
//! and a linear backoff before retrying a failed lookup.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use enricher_core::pacing::{PacingConfig, PacingPolicy};
//!
//! let config = PacingConfig::default()
//!     .with_item_delay(Duration::from_secs(2), Duration::from_secs(4));
//! let policy = PacingPolicy::new(config);
//!
//! let pause = policy.inter_item_delay();
//! assert!(pause >= Duration::from_secs(2) && pause <= Duration::from_secs(4));
//! assert_eq!(policy.retry_backoff(2), Duration::from_secs(10));
//! ```

use std::time::Duration;

use rand::Rng;

use crate::error::AppError;

/// Inclusive range a random delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Result<Self, AppError> {
        if min > max {
            return Err(AppError::ConfigError(format!(
                "delay range minimum {min:?} exceeds maximum {max:?}"
            )));
        }
        Ok(Self { min, max })
    }

    pub const fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    pub const fn from_secs(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max),
        }
    }

    /// Draw a uniformly distributed delay from the range.
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

/// Configuration for the pacing policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingConfig {
    /// Pause between consecutive item lookups.
    pub item_delay: DelayRange,

    /// Pause after each completed batch.
    pub batch_delay: DelayRange,

    /// Backoff unit; retry `n` waits `n * retry_base_delay`.
    pub retry_base_delay: Duration,
}

impl Default for PacingConfig {
    /// 10–20s between items, 30–60s between batches, 5s backoff unit.
    fn default() -> Self {
        Self {
            item_delay: DelayRange::from_secs(10, 20),
            batch_delay: DelayRange::from_secs(30, 60),
            retry_base_delay: Duration::from_secs(5),
        }
    }
}

impl PacingConfig {
    /// No pauses at all. Useful for tests and local dry runs.
    pub fn immediate() -> Self {
        Self {
            item_delay: DelayRange::fixed(Duration::ZERO),
            batch_delay: DelayRange::fixed(Duration::ZERO),
            retry_base_delay: Duration::ZERO,
        }
    }

    pub fn with_item_delay(mut self, min: Duration, max: Duration) -> Self {
        self.item_delay = DelayRange { min, max };
        self
    }

    pub fn with_batch_delay(mut self, min: Duration, max: Duration) -> Self {
        self.batch_delay = DelayRange { min, max };
        self
    }

    pub fn with_retry_base_delay(mut self, base: Duration) -> Self {
        self.retry_base_delay = base;
        self
    }

    /// Reject inverted ranges.
    pub fn validate(&self) -> Result<(), AppError> {
        DelayRange::new(self.item_delay.min, self.item_delay.max)?;
        DelayRange::new(self.batch_delay.min, self.batch_delay.max)?;
        Ok(())
    }
}

/// Computes the delays the scheduler sleeps for.
///
/// Pure function of its configuration and the attempt number. Randomness has
/// no reproducibility guarantee across runs.
#[derive(Debug, Clone, Default)]
pub struct PacingPolicy {
    config: PacingConfig,
}

impl PacingPolicy {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    pub fn inter_item_delay(&self) -> Duration {
        self.config.item_delay.sample()
    }

    pub fn inter_batch_delay(&self) -> Duration {
        self.config.batch_delay.sample()
    }

    /// Linear backoff before retry number `attempt` (1-indexed).
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        self.config.retry_base_delay.saturating_mul(attempt)
    }
}
