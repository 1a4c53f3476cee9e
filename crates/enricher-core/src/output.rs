//! Result-file stage: fixed output schema and atomic file publication.

use std::path::{Path, PathBuf};

use crate::config::OutputConfig;
use crate::error::AppError;
use crate::models::{OutputRow, TableFormat};
use crate::traits::TableWriter;

/// Written in place of a value the catalog did not provide.
pub const UNAVAILABLE: &str = "NA";

/// Number of columns in every result file.
pub const OUTPUT_COLUMNS: usize = 21;

/// Names the catalog in the source-specific output headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSource {
    /// e.g. `amazon.in`, used in "Composition_on_amazon.in".
    pub domain: String,
    /// e.g. `Amazon`, used in "Amazon URL".
    pub label: String,
}

impl Default for CatalogSource {
    fn default() -> Self {
        Self {
            domain: "amazon.in".to_string(),
            label: "Amazon".to_string(),
        }
    }
}

impl CatalogSource {
    /// Header row, identical for CSV and XLSX output.
    pub fn headers(&self) -> Vec<String> {
        vec![
            "SrNo".to_string(),
            "Item Code".to_string(),
            "Item Name".to_string(),
            "Title".to_string(),
            format!("Composition_on_{}", self.domain),
            "Price".to_string(),
            format!("Product Details as on {}", self.domain),
            "Image URL".to_string(),
            format!("{} URL", self.label),
            "Is Discontinued".to_string(),
            "UNSPSC Code".to_string(),
            "Product Dimensions".to_string(),
            "Item Weight".to_string(),
            "Manufacturer".to_string(),
            "ASIN".to_string(),
            "Model Number".to_string(),
            "Country of Origin".to_string(),
            "Date First Available".to_string(),
            "Included Components".to_string(),
            "Generic Name".to_string(),
            "Error".to_string(),
        ]
    }

    /// File name offered to downloaders, e.g. `amazon_results_ab12cd34.csv`.
    pub fn download_name(&self, job_id: &str, format: TableFormat) -> String {
        format!(
            "{}_results_{}.{}",
            self.label.to_lowercase().replace(' ', "_"),
            job_id,
            format.extension()
        )
    }
}

/// Flatten one row into the output column order.
///
/// Missing identifiers and unavailable catalog fields become [`UNAVAILABLE`];
/// rows skipped for an empty item name carry empty catalog columns.
pub fn to_record(row: &OutputRow) -> Vec<String> {
    let item = &row.item;
    let mut record = Vec::with_capacity(OUTPUT_COLUMNS);
    record.push(item.sr_no.clone().unwrap_or_else(|| UNAVAILABLE.to_string()));
    record.push(item.item_code.clone().unwrap_or_else(|| UNAVAILABLE.to_string()));
    record.push(item.item_name.clone());

    let Some(result) = &row.extraction else {
        record.resize(OUTPUT_COLUMNS, String::new());
        return record;
    };

    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| UNAVAILABLE.to_string());
    let attrs = &result.attributes;

    record.push(field(&result.title));
    record.push(field(&result.description));
    record.push(field(&result.price));
    record.push(field(&result.product_details));
    record.push(field(&result.image_url));
    record.push(field(&result.product_url));
    record.push(
        match result.discontinued {
            Some(true) => "Yes",
            Some(false) => "No",
            None => UNAVAILABLE,
        }
        .to_string(),
    );
    record.push(field(&attrs.unspsc_code));
    record.push(field(&attrs.dimensions));
    record.push(field(&attrs.weight));
    record.push(field(&attrs.manufacturer));
    record.push(field(&attrs.asin));
    record.push(field(&attrs.model_number));
    record.push(field(&attrs.country_of_origin));
    record.push(field(&attrs.date_first_available));
    record.push(field(&attrs.included_components));
    record.push(field(&attrs.generic_name));
    record.push(result.error.clone().unwrap_or_default());
    record
}

/// Serializes a finished job's rows and publishes the file.
#[derive(Clone)]
pub struct OutputStage<W: TableWriter> {
    writer: W,
    config: OutputConfig,
}

impl<W: TableWriter> OutputStage<W> {
    pub fn new(writer: W, config: OutputConfig) -> Self {
        Self { writer, config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Final location of a job's result file.
    pub fn output_path(&self, job_id: &str, format: TableFormat) -> PathBuf {
        self.config
            .output_dir
            .join(format!("output_{}.{}", job_id, format.extension()))
    }

    /// Write a job's rows to its result file and return the file's path.
    pub async fn write(
        &self,
        job_id: &str,
        format: TableFormat,
        rows: &[OutputRow],
    ) -> Result<PathBuf, AppError> {
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| {
                AppError::OutputError(format!(
                    "cannot create {}: {e}",
                    self.config.output_dir.display()
                ))
            })?;

        let path = self.output_path(job_id, format);
        self.write_to(&path, format, rows).await?;
        Ok(path)
    }

    /// Write rows to `path`.
    ///
    /// The table is written to a `.partial` sibling first and renamed into
    /// place, so `path` only ever holds a complete file.
    pub async fn write_to(
        &self,
        path: &Path,
        format: TableFormat,
        rows: &[OutputRow],
    ) -> Result<(), AppError> {
        let partial = partial_path(path);
        let records = rows.iter().map(to_record).collect();

        if let Err(e) = self
            .writer
            .write_table(&partial, format, self.config.source.headers(), records)
            .await
        {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(match e {
                AppError::OutputError(_) => e,
                other => AppError::OutputError(other.to_string()),
            });
        }

        tokio::fs::rename(&partial, path).await.map_err(|e| {
            AppError::OutputError(format!("cannot publish {}: {e}", path.display()))
        })
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}
