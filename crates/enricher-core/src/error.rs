use thiserror::Error;

/// Application-wide error types for the catalog enricher.
#[derive(Error, Debug)]
pub enum AppError {
    /// The uploaded input could not be read or parsed.
    #[error("Input error: {0}")]
    InputError(String),

    /// The result file could not be serialized or written.
    #[error("Output error: {0}")]
    OutputError(String),

    /// A catalog lookup failed (navigation, selector, parse).
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// Headless browser could not be launched or driven.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// Operation timed out.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// A job with this identifier already exists in the registry.
    #[error("Job already exists: {0}")]
    DuplicateJob(String),

    /// No job with this identifier is known.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Uploaded file has an extension we cannot process.
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Invalid or missing configuration.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// The job's cancellation token fired.
    #[error("Job cancelled")]
    Cancelled,

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}
