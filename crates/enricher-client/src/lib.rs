pub mod details;
pub mod tabular;

#[cfg(feature = "browser")]
pub mod browser_extractor;

#[cfg(feature = "browser")]
pub use browser_extractor::{BrowserExtractor, BrowserExtractorConfig};
pub use tabular::TabularFiles;
