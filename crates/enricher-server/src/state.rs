use std::path::PathBuf;

use enricher_core::{CatalogSource, JobService};

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub service: JobService,
    /// Names download files after the catalog.
    pub source: CatalogSource,
    /// Where uploads are staged until their job has parsed them.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}
