/// Smoke-test for `BrowserExtractor`.
///
/// Launches a headless Chromium, looks up one item on the live catalog and
/// prints what was extracted.
///
/// Run with:
///   cargo run --example browser_smoke --features browser -- "Crocin Advance"
use enricher_client::{BrowserExtractor, BrowserExtractorConfig};
use enricher_core::traits::ProductExtractor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let item = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Crocin Advance 500mg".to_string());

    println!("Launching headless browser…");
    let extractor = BrowserExtractor::with_config(BrowserExtractorConfig::from_env()).await?;

    println!("Looking up {item:?} …");
    let result = extractor.extract(&item).await;

    if let Some(error) = &result.error {
        anyhow::bail!("lookup failed: {error}");
    }
    anyhow::ensure!(result.title.is_some(), "no product title extracted");

    println!("Title:        {}", result.title.as_deref().unwrap_or("-"));
    println!("Price:        {}", result.price.as_deref().unwrap_or("-"));
    println!("URL:          {}", result.product_url.as_deref().unwrap_or("-"));
    println!("ASIN:         {}", result.attributes.asin.as_deref().unwrap_or("-"));
    println!("Discontinued: {:?}", result.discontinued);
    Ok(())
}
