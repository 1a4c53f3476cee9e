use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::element::Element;
use chromiumoxide::{Browser, BrowserConfig, Page};
use enricher_core::error::AppError;
use enricher_core::models::ExtractionResult;
use enricher_core::pacing::DelayRange;
use enricher_core::traits::ProductExtractor;
use futures::StreamExt;

use crate::details::{is_discontinued, non_empty, parse_product_details};

const SEARCH_BOX: &str = "#twotabsearchtextbox";
const COOKIE_ACCEPT: &str = "#sp-cc-accept";
const SEARCH_SUBMIT: &str = "#nav-search-submit-button";
const FIRST_RESULT_IMAGE: &str = "div.s-result-item[data-component-type='s-search-result'] img";
const PRODUCT_TITLE: &str = "#productTitle";
const PRICE: &str = ".a-price .a-offscreen";
const PRICE_WHOLE: &str = ".a-price-whole";
const LANDING_IMAGE: &str = "#landingImage";
const DESCRIPTION: &str = "#productDescription";
const FEATURE_BULLETS: &str = "#feature-bullets .a-list-item";
const DETAIL_BULLETS: &str = "#detailBullets_feature_div";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Time kept free between the end of a lookup and the caller's attempt deadline.
const LOOKUP_MARGIN: Duration = Duration::from_secs(5);

/// Site and timing settings for [`BrowserExtractor`].
#[derive(Debug, Clone)]
pub struct BrowserExtractorConfig {
    /// Catalog home page with the search box.
    pub catalog_url: String,
    /// Upper bound for one whole lookup, opening the tab included.
    pub lookup_timeout: Duration,
    /// How long to wait for each expected element to appear.
    pub element_timeout: Duration,
    /// Pause between typed characters.
    pub keystroke_delay: DelayRange,
    /// Pause on the search results before opening the first hit.
    pub results_pause: DelayRange,
    /// Pause on the product page before reading it.
    pub product_pause: DelayRange,
}

impl Default for BrowserExtractorConfig {
    fn default() -> Self {
        Self {
            catalog_url: "https://www.amazon.in".to_string(),
            lookup_timeout: Duration::from_secs(55),
            element_timeout: Duration::from_secs(15),
            keystroke_delay: DelayRange {
                min: Duration::from_millis(50),
                max: Duration::from_millis(200),
            },
            results_pause: DelayRange::from_secs(3, 7),
            product_pause: DelayRange::from_secs(4, 8),
        }
    }
}

impl BrowserExtractorConfig {
    /// Defaults with the catalog URL taken from `ENRICHER_CATALOG_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("ENRICHER_CATALOG_URL")
            && !url.trim().is_empty()
        {
            config.catalog_url = url.trim().to_string();
        }
        config
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Bound lookups so they give up shortly before a caller's per-attempt
    /// timeout of `attempt_timeout` would.
    pub fn within_attempt_timeout(self, attempt_timeout: Duration) -> Self {
        let budget = attempt_timeout
            .saturating_sub(LOOKUP_MARGIN)
            .max(attempt_timeout / 2);
        self.with_lookup_timeout(budget)
    }
}

/// Catalog extractor that drives a headless Chromium like a shopper would.
///
/// A single Chromium process is shared across all clones of this struct;
/// each [`ProductExtractor::extract`] call opens a new tab, searches for the
/// item, opens the first result, reads the product page and closes the tab.
///
/// # Example
///
/// ```rust,no_run
/// use enricher_client::BrowserExtractor;
/// use enricher_core::traits::ProductExtractor;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let extractor = BrowserExtractor::new().await?;
/// let result = extractor.extract("Crocin Advance 500mg").await;
/// println!("{:?}", result.title);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BrowserExtractor {
    browser: Arc<Browser>,
    config: Arc<BrowserExtractorConfig>,
}

impl BrowserExtractor {
    /// Launches a headless Chromium with default settings.
    ///
    /// Requires a Chromium / Chrome binary reachable via `$PATH`, `CHROME_BIN`
    /// or one of the well-known install locations.
    pub async fn new() -> Result<Self, AppError> {
        Self::with_config(BrowserExtractorConfig::default()).await
    }

    pub async fn with_config(config: BrowserExtractorConfig) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let browser_config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .arg("--window-size=1366,768")
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        tracing::info!(catalog_url = %config.catalog_url, "Browser extractor ready");
        Ok(Self {
            browser: Arc::new(browser),
            config: Arc::new(config),
        })
    }

    /// Tries to locate the real Chrome/Chromium binary.
    ///
    /// The snap wrapper at `/snap/bin/chromium` strips unknown CLI flags, so
    /// the binary inside the snap is preferred. `None` leaves the lookup to
    /// `chromiumoxide`.
    fn find_chrome_binary() -> Option<PathBuf> {
        const CANDIDATES: &[&str] = &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        CANDIDATES.iter().map(PathBuf::from).find(|p| p.exists())
    }

    async fn lookup(&self, page: &Page, item_name: &str) -> Result<ExtractionResult, AppError> {
        let wait = self.config.element_timeout;

        let search_box = wait_for(page, SEARCH_BOX, wait).await?;
        if let Ok(accept) = page.find_element(COOKIE_ACCEPT).await {
            let _ = accept.click().await;
        }

        search_box.click().await.map_err(step_err("focus search box"))?;
        for ch in item_name.chars() {
            search_box
                .type_str(ch.to_string())
                .await
                .map_err(step_err("type item name"))?;
            tokio::time::sleep(self.config.keystroke_delay.sample()).await;
        }

        page.find_element(SEARCH_SUBMIT)
            .await
            .map_err(step_err("find search button"))?
            .click()
            .await
            .map_err(step_err("submit search"))?;

        let first_result = wait_for(page, FIRST_RESULT_IMAGE, wait)
            .await
            .map_err(|_| AppError::ExtractionError(format!("No search results for '{item_name}'")))?;
        tokio::time::sleep(self.config.results_pause.sample()).await;

        first_result
            .click()
            .await
            .map_err(step_err("open first result"))?;
        wait_for(page, PRODUCT_TITLE, wait).await?;
        tokio::time::sleep(self.config.product_pause.sample()).await;

        let title = text_of(page, PRODUCT_TITLE).await;
        let price = match text_of(page, PRICE).await {
            Some(price) => Some(price),
            None => text_of(page, PRICE_WHOLE).await,
        };
        let image_url = attribute_of(page, LANDING_IMAGE, "src").await;
        let description = match text_of(page, DESCRIPTION).await {
            Some(description) => Some(description),
            None => feature_bullets(page).await,
        };
        let product_details = text_of(page, DETAIL_BULLETS).await;
        let discontinued = page.content().await.ok().map(|html| is_discontinued(&html));
        let product_url = page.url().await.ok().flatten();

        let attributes = product_details
            .as_deref()
            .map(parse_product_details)
            .unwrap_or_default();

        Ok(ExtractionResult {
            title,
            description,
            price,
            image_url,
            product_url,
            product_details,
            discontinued,
            attributes,
            error: None,
        })
    }
}

impl BrowserExtractor {
    async fn open_and_lookup(&self, item_name: &str) -> Result<ExtractionResult, AppError> {
        let page = self
            .browser
            .new_page(self.config.catalog_url.as_str())
            .await
            .map_err(|e| {
                AppError::BrowserError(format!("Failed to open {}: {e}", self.config.catalog_url))
            })?;

        let tab = TabGuard::new(page);
        let result = self.lookup(tab.tab(), item_name).await;
        tab.close().await;
        result
    }
}

impl ProductExtractor for BrowserExtractor {
    async fn extract(&self, item_name: &str) -> ExtractionResult {
        let timeout = self.config.lookup_timeout;
        match tokio::time::timeout(timeout, self.open_and_lookup(item_name)).await {
            Ok(Ok(result)) => result,
            Ok(Err(error)) => {
                tracing::warn!(%item_name, %error, "Lookup failed");
                ExtractionResult::failed(error.to_string())
            }
            Err(_) => {
                let error = AppError::Timeout(timeout.as_secs());
                tracing::warn!(%item_name, %error, "Lookup timed out");
                ExtractionResult::failed(error.to_string())
            }
        }
    }
}

/// A browser tab that can be closed from a background task.
trait Tab: Clone + Send + Sync + 'static {
    fn release(self) -> impl Future<Output = ()> + Send + 'static;
}

impl Tab for Page {
    async fn release(self) {
        if let Err(e) = self.close().await {
            tracing::debug!(error = %e, "Failed to close tab");
        }
    }
}

/// Owns an open tab and closes it even when the lookup future is dropped
/// part-way (timeout or job cancellation).
struct TabGuard<T: Tab> {
    tab: T,
    released: bool,
}

impl<T: Tab> TabGuard<T> {
    fn new(tab: T) -> Self {
        Self {
            tab,
            released: false,
        }
    }

    fn tab(&self) -> &T {
        &self.tab
    }

    /// Close the tab and wait for it. The close still completes if this
    /// future is dropped.
    async fn close(mut self) {
        if let Some(handle) = self.spawn_release() {
            let _ = handle.await;
        }
    }

    fn spawn_release(&mut self) -> Option<tokio::task::JoinHandle<()>> {
        if std::mem::replace(&mut self.released, true) {
            return None;
        }
        let handle = tokio::runtime::Handle::try_current().ok()?;
        Some(handle.spawn(self.tab.clone().release()))
    }
}

impl<T: Tab> Drop for TabGuard<T> {
    fn drop(&mut self) {
        let _ = self.spawn_release();
    }
}

fn step_err(step: &'static str) -> impl Fn(chromiumoxide::error::CdpError) -> AppError {
    move |e| AppError::ExtractionError(format!("Failed to {step}: {e}"))
}

/// Poll for `selector` until it appears or `within` elapses.
async fn wait_for(page: &Page, selector: &str, within: Duration) -> Result<Element, AppError> {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        match page.find_element(selector).await {
            Ok(element) => return Ok(element),
            Err(_) if tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            Err(e) => {
                return Err(AppError::ExtractionError(format!(
                    "Element {selector} did not appear: {e}"
                )));
            }
        }
    }
}

async fn text_of(page: &Page, selector: &str) -> Option<String> {
    let element = page.find_element(selector).await.ok()?;
    let text = element.inner_text().await.ok()??;
    non_empty(&text)
}

async fn attribute_of(page: &Page, selector: &str, attribute: &str) -> Option<String> {
    let element = page.find_element(selector).await.ok()?;
    let value = element.attribute(attribute).await.ok()??;
    non_empty(&value)
}

async fn feature_bullets(page: &Page) -> Option<String> {
    let items = page.find_elements(FEATURE_BULLETS).await.ok()?;
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        if let Some(text) = item.inner_text().await.ok().flatten().as_deref().and_then(non_empty) {
            lines.push(text);
        }
    }
    non_empty(&lines.join("\n"))
}
