use std::future::Future;
use std::path::Path;

use crate::error::AppError;
use crate::models::{ExtractionResult, InputTable, TableFormat};

/// Looks up one item name in the external catalog.
///
/// Never fails with an `Err`: a lookup that could not be completed comes
/// back as an [`ExtractionResult`] whose `error` is set, and individual
/// fields the catalog did not expose are left as `None`.
pub trait ProductExtractor: Send + Sync + Clone + 'static {
    fn extract(&self, item_name: &str) -> impl Future<Output = ExtractionResult> + Send;
}

/// Parses an uploaded tabular file into a header row and data rows.
pub trait TableReader: Send + Sync + Clone + 'static {
    fn read_table(
        &self,
        path: &Path,
        format: TableFormat,
    ) -> impl Future<Output = Result<InputTable, AppError>> + Send;
}

/// Serializes a header row and records to a tabular file at `path`.
pub trait TableWriter: Send + Sync + Clone + 'static {
    fn write_table(
        &self,
        path: &Path,
        format: TableFormat,
        headers: Vec<String>,
        records: Vec<Vec<String>>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}
