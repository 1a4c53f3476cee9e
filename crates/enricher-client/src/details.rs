use enricher_core::models::CatalogAttributes;

const DISCONTINUED_MARKERS: &[&str] = &[
    "currently unavailable",
    "we don't know when or if this item will be back in stock",
];

/// Trim `text` and return it unless nothing is left.
pub fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parse a product detail section into catalog attributes.
///
/// The section is a list of `key : value` lines. Keys are matched by
/// case-insensitive substring; the first matching attribute wins for each
/// line and a later line overwrites an earlier value. Left-to-right and
/// right-to-left marks, which the catalog pads keys with, are stripped.
pub fn parse_product_details(text: &str) -> CatalogAttributes {
    let mut attrs = CatalogAttributes::default();

    for line in text.lines() {
        let line: String = line
            .chars()
            .filter(|c| !matches!(c, '\u{200e}' | '\u{200f}'))
            .collect();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let Some(value) = non_empty(value) else {
            continue;
        };

        let slot = if key.contains("asin") {
            &mut attrs.asin
        } else if key.contains("manufacturer") {
            &mut attrs.manufacturer
        } else if key.contains("country of origin") {
            &mut attrs.country_of_origin
        } else if key.contains("date first available") {
            &mut attrs.date_first_available
        } else if key.contains("model") && key.contains("number") {
            &mut attrs.model_number
        } else if key.contains("weight") {
            &mut attrs.weight
        } else if key.contains("dimension") {
            &mut attrs.dimensions
        } else if key.contains("included") && key.contains("component") {
            &mut attrs.included_components
        } else if key.contains("generic name") {
            &mut attrs.generic_name
        } else if key.contains("unspsc") {
            &mut attrs.unspsc_code
        } else {
            continue;
        };
        *slot = Some(value);
    }

    attrs
}

/// Whether a product page says the item cannot currently be bought.
pub fn is_discontinued(page_text: &str) -> bool {
    let lower = page_text.to_lowercase();
    DISCONTINUED_MARKERS.iter().any(|m| lower.contains(m))
}
