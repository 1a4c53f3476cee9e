use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};
use enricher_core::error::AppError;
use enricher_core::models::{InputTable, TableFormat};
use enricher_core::traits::{TableReader, TableWriter};
use rust_xlsxwriter::{Format, Workbook};

/// Worksheet name used for XLSX results.
pub const RESULTS_SHEET: &str = "Results";

/// Longest string Excel stores in one cell, in characters.
pub const XLSX_MAX_CELL_CHARS: usize = 32_767;

/// CSV and XLSX reader/writer on the local filesystem.
///
/// Parsing and serialization are blocking and run on tokio's blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabularFiles;

impl TabularFiles {
    pub fn new() -> Self {
        Self
    }
}

impl TableReader for TabularFiles {
    async fn read_table(&self, path: &Path, format: TableFormat) -> Result<InputTable, AppError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || match format {
            TableFormat::Csv => read_csv(&path),
            TableFormat::Xlsx => read_xlsx(&path),
        })
        .await
        .map_err(|e| AppError::Generic(format!("Reader task failed: {e}")))?
    }
}

impl TableWriter for TabularFiles {
    async fn write_table(
        &self,
        path: &Path,
        format: TableFormat,
        headers: Vec<String>,
        records: Vec<Vec<String>>,
    ) -> Result<(), AppError> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || match format {
            TableFormat::Csv => write_csv(&path, &headers, &records),
            TableFormat::Xlsx => write_xlsx(&path, &headers, &records),
        })
        .await
        .map_err(|e| AppError::Generic(format!("Writer task failed: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn read_csv(path: &Path) -> Result<InputTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_path(path)
        .map_err(|e| AppError::InputError(format!("Cannot open CSV: {e}")))?;

    let headers = reader
        .headers()
        .map_err(|e| AppError::InputError(format!("Cannot read CSV header: {e}")))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AppError::InputError(format!("Malformed CSV: {e}")))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(InputTable { headers, rows })
}

fn write_csv(path: &Path, headers: &[String], records: &[Vec<String>]) -> Result<(), AppError> {
    let csv_err = |e: csv::Error| AppError::OutputError(format!("CSV write failed: {e}"));

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(headers).map_err(csv_err)?;
    for record in records {
        writer.write_record(record).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::OutputError(format!("CSV write failed: {e}")))
}

// ---------------------------------------------------------------------------
// XLSX
// ---------------------------------------------------------------------------

/// A cell's string content, or empty when the cell is blank.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn read_xlsx(path: &Path) -> Result<InputTable, AppError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AppError::InputError(format!("Cannot open workbook: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::InputError("Workbook has no worksheets".into()))?
        .map_err(|e| AppError::InputError(format!("Cannot read first worksheet: {e}")))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    let headers = rows.next().unwrap_or_default();

    Ok(InputTable {
        headers,
        rows: rows.collect(),
    })
}

/// Cut `value` to what fits in one worksheet cell.
fn fit_cell(value: &str) -> &str {
    match value.char_indices().nth(XLSX_MAX_CELL_CHARS) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

fn write_xlsx(path: &Path, headers: &[String], records: &[Vec<String>]) -> Result<(), AppError> {
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| {
        AppError::OutputError(format!("XLSX write failed: {e}"))
    };
    let index_err = || AppError::OutputError("Table too large for a worksheet".into());

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(RESULTS_SHEET).map_err(xlsx_err)?;

    for (col, header) in headers.iter().enumerate() {
        let col = u16::try_from(col).map_err(|_| index_err())?;
        sheet
            .write_string_with_format(0, col, header, &header_format)
            .map_err(xlsx_err)?;
    }

    for (row, record) in records.iter().enumerate() {
        let row = u32::try_from(row + 1).map_err(|_| index_err())?;
        for (col, value) in record.iter().enumerate() {
            let col = u16::try_from(col).map_err(|_| index_err())?;
            let cell = fit_cell(value);
            if cell.len() < value.len() {
                tracing::warn!(%row, %col, "Truncated cell to the XLSX length limit");
            }
            sheet.write_string(row, col, cell).map_err(xlsx_err)?;
        }
    }

    workbook.save(path).map_err(xlsx_err)
}
