use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Tabular file formats accepted for upload and produced as output.
///
/// The output of a job always uses the same format as its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Csv,
    Xlsx,
}

impl TableFormat {
    /// Detect the format from a file name's extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Result<Self, AppError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(TableFormat::Csv),
            Some("xlsx") => Ok(TableFormat::Xlsx),
            _ => Err(AppError::UnsupportedFileType(name.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            TableFormat::Csv => "text/csv",
            TableFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// A parsed input file: one header row followed by data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub const SR_NO_COLUMN: &str = "SrNo";
pub const ITEM_CODE_COLUMN: &str = "Item Code";
pub const ITEM_NAME_COLUMN: &str = "Item Name";

/// Positions of the identifying columns, resolved once from the header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub sr_no: Option<usize>,
    pub item_code: Option<usize>,
    pub item_name: Option<usize>,
}

impl ColumnMap {
    /// Match header names case-insensitively, ignoring surrounding whitespace.
    pub fn resolve(headers: &[String]) -> Self {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        Self {
            sr_no: find(SR_NO_COLUMN),
            item_code: find(ITEM_CODE_COLUMN),
            item_name: find(ITEM_NAME_COLUMN),
        }
    }

    /// Pull the identifying values out of one data row.
    ///
    /// A missing column or a short row yields `None` for SrNo / Item Code
    /// and an empty item name. Cell text is kept as written.
    pub fn item(&self, row: &[String]) -> InputItem {
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).cloned();

        InputItem {
            sr_no: cell(self.sr_no),
            item_code: cell(self.item_code),
            item_name: cell(self.item_name).unwrap_or_default(),
        }
    }
}

/// Identifying columns carried through from one input row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputItem {
    pub sr_no: Option<String>,
    pub item_code: Option<String>,
    pub item_name: String,
}

impl InputItem {
    /// The name searched for on the catalog.
    pub fn lookup_name(&self) -> &str {
        self.item_name.trim()
    }

    /// Rows without an item name are recorded but never looked up.
    pub fn is_skippable(&self) -> bool {
        self.lookup_name().is_empty()
    }
}

/// Catalog attributes parsed from a product's detail section.
///
/// `None` means the catalog did not expose the attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogAttributes {
    pub unspsc_code: Option<String>,
    pub dimensions: Option<String>,
    pub weight: Option<String>,
    pub manufacturer: Option<String>,
    pub asin: Option<String>,
    pub model_number: Option<String>,
    pub country_of_origin: Option<String>,
    pub date_first_available: Option<String>,
    pub included_components: Option<String>,
    pub generic_name: Option<String>,
}

/// Result of one extraction attempt for a single item name.
///
/// A total failure is expressed as a value: `error` is set and every other
/// field is left unavailable. Retries produce a fresh instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    /// Raw text of the product detail section.
    pub product_details: Option<String>,
    pub discontinued: Option<bool>,
    pub attributes: CatalogAttributes,
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// True when the attempt failed as a whole and is worth retrying.
    pub fn is_failure(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}

/// One row of the result file, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub item: InputItem,
    /// `None` for rows skipped because the item name was empty.
    pub extraction: Option<ExtractionResult>,
}

impl OutputRow {
    pub fn skipped(item: InputItem) -> Self {
        Self {
            item,
            extraction: None,
        }
    }

    pub fn extracted(item: InputItem, result: ExtractionResult) -> Self {
        Self {
            item,
            extraction: Some(result),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.extraction.as_ref().and_then(|e| e.error.as_deref())
    }
}
