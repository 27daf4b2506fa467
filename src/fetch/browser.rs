//! Chrome-driven fetcher for rendered pages.
//!
//! Uses chromiumoxide (CDP). One fetcher owns one browser process and one
//! tab, so scroll and click state lives as long as the fetcher does.

use std::path::PathBuf;
#[cfg(feature = "browser")]
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetUserAgentOverrideParams};
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page as Tab};
#[cfg(feature = "browser")]
use futures::StreamExt;

use super::{Page, PageFetcher};
use crate::config::SpiderConfig;
use crate::error::FetchError;

/// Whether this build can drive a real browser.
pub const AVAILABLE: bool = cfg!(feature = "browser");

/// Launch settings taken from a spider config.
#[derive(Debug, Clone, Default)]
pub struct BrowserOptions {
    pub headless: bool,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    pub cookies_file: Option<PathBuf>,
    /// Page visited before cookies are installed.
    pub base_url: String,
    /// Navigation timeout in seconds.
    pub timeout: u64,
}

impl BrowserOptions {
    pub fn from_config(config: &SpiderConfig) -> Self {
        Self {
            headless: config.headless,
            proxy: config.proxy.clone(),
            user_agent: config.user_agent.clone(),
            cookies_file: config.cookies_file.clone(),
            base_url: config.base_url.clone(),
            timeout: config.timeout,
        }
    }
}

#[cfg(feature = "browser")]
const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";

#[cfg(feature = "browser")]
const PAGE_HEIGHT_SCRIPT: &str = "document.body.scrollHeight";

/// Selector, quoted for embedding in a script.
#[cfg(feature = "browser")]
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(feature = "browser")]
fn cdp_error(e: impl std::fmt::Display) -> FetchError {
    FetchError::Browser(e.to_string())
}

/// Browser-backed page fetcher.
#[cfg(feature = "browser")]
pub struct BrowserFetcher {
    options: BrowserOptions,
    browser: Option<Browser>,
    tab: Option<Tab>,
    handler: Option<tokio::task::JoinHandle<()>>,
}

#[cfg(feature = "browser")]
impl BrowserFetcher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            browser: None,
            tab: None,
            handler: None,
        }
    }

    fn find_chrome() -> Option<PathBuf> {
        Self::CHROME_PATHS
            .iter()
            .map(std::path::Path::new)
            .find(|p| p.exists())
            .map(|p| {
                info!("Found Chrome at: {}", p.display());
                p.to_path_buf()
            })
    }

    /// Start the browser and open the working tab.
    pub async fn launch(&mut self) -> Result<(), FetchError> {
        if self.browser.is_some() {
            return Ok(());
        }

        info!("Launching browser (headless={})", self.options.headless);

        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_secs(self.options.timeout));
        if let Some(path) = Self::find_chrome() {
            builder = builder.chrome_executable(path);
        }
        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(ref proxy) = self.options.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--window-size=1920,1080");

        let config = builder
            .build()
            .map_err(|e| FetchError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(cdp_error)?;

        self.handler = Some(tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        }));

        let tab = browser.new_page("about:blank").await.map_err(cdp_error)?;
        if let Some(ref ua) = self.options.user_agent {
            tab.execute(SetUserAgentOverrideParams::new(ua.clone()))
                .await
                .map_err(cdp_error)?;
        }

        self.browser = Some(browser);
        self.tab = Some(tab);

        if let Some(path) = self.options.cookies_file.clone() {
            self.install_cookies(&path).await;
        }

        Ok(())
    }

    /// Visit the base URL, set cookies for it, then reload.
    async fn install_cookies(&self, path: &std::path::Path) {
        let cookies = super::cookies::load_cookies(path);
        if cookies.is_empty() {
            return;
        }
        let Ok(tab) = self.tab() else {
            return;
        };

        if let Err(e) = tab.goto(self.options.base_url.as_str()).await {
            warn!("Failed to open {} for cookies: {}", self.options.base_url, e);
            return;
        }

        let params: Vec<CookieParam> = cookies
            .iter()
            .filter_map(|c| {
                let mut builder = CookieParam::builder()
                    .name(c.name.clone())
                    .value(c.value.clone())
                    .path(c.path.clone())
                    .secure(c.secure)
                    .http_only(c.http_only);
                builder = if c.domain.is_empty() {
                    builder.url(self.options.base_url.clone())
                } else {
                    builder.domain(c.domain.clone())
                };
                match builder.build() {
                    Ok(param) => Some(param),
                    Err(e) => {
                        warn!("Failed to build cookie {}: {}", c.name, e);
                        None
                    }
                }
            })
            .collect();

        let count = params.len();
        if let Err(e) = tab.set_cookies(params).await {
            warn!("Failed to set cookies: {}", e);
            return;
        }
        if let Err(e) = tab.reload().await {
            warn!("Reload after setting cookies failed: {}", e);
        }
        info!("Installed {} cookies", count);
    }

    fn tab(&self) -> Result<&Tab, FetchError> {
        self.tab
            .as_ref()
            .ok_or_else(|| FetchError::Browser("browser not launched".to_string()))
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T, FetchError> {
        self.tab()?
            .evaluate(script)
            .await
            .map_err(cdp_error)?
            .into_value::<T>()
            .map_err(cdp_error)
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        let timeout = Duration::from_secs(self.options.timeout);
        let tab = self.tab()?;
        match tokio::time::timeout(timeout, tab.goto(url)).await {
            Ok(Ok(_)) => debug!("Loaded {}", url),
            Ok(Err(e)) => return Err(cdp_error(e)),
            Err(_) => {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    secs: self.options.timeout,
                })
            }
        }
        Ok(())
    }

    async fn content(&mut self) -> Result<Page, FetchError> {
        let html = self.tab()?.content().await.map_err(cdp_error)?;
        Ok(Page::Html(html))
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), FetchError> {
        self.tab()?
            .evaluate(SCROLL_TO_BOTTOM_SCRIPT)
            .await
            .map_err(cdp_error)?;
        Ok(())
    }

    async fn scroll_by(&mut self, dy: i64) -> Result<(), FetchError> {
        self.tab()?
            .evaluate(format!("window.scrollBy(0, {})", dy))
            .await
            .map_err(cdp_error)?;
        Ok(())
    }

    async fn page_height(&mut self) -> Result<u64, FetchError> {
        let height: f64 = self.eval(PAGE_HEIGHT_SCRIPT.to_string()).await?;
        Ok(height.max(0.0) as u64)
    }

    async fn click(&mut self, selector: &str) -> Result<bool, FetchError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el || el.disabled || el.offsetParent === null) return false; \
             el.scrollIntoView({{block: 'center'}}); el.click(); return true; }})()",
            js_string(selector)
        );
        self.eval(script).await
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, FetchError> {
        let script = format!("document.querySelector({}) !== null", js_string(selector));
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.eval::<bool>(script.clone()).await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn close(&mut self) {
        self.tab = None;
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!("Browser close failed: {}", e);
            }
            let _ = browser.wait().await;
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserFetcher {
    #[allow(dead_code)]
    options: BrowserOptions,
}

#[cfg(not(feature = "browser"))]
fn not_compiled() -> FetchError {
    FetchError::Browser(
        "Browser support not compiled. Rebuild with: cargo build --features browser".to_string(),
    )
}

#[cfg(not(feature = "browser"))]
impl BrowserFetcher {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    pub async fn launch(&mut self) -> Result<(), FetchError> {
        Err(not_compiled())
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn navigate(&mut self, _url: &str) -> Result<(), FetchError> {
        Err(not_compiled())
    }

    async fn content(&mut self) -> Result<Page, FetchError> {
        Err(not_compiled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let mut config = SpiderConfig {
            base_url: "https://example.com/".to_string(),
            headless: false,
            proxy: Some("socks5://127.0.0.1:1080".to_string()),
            ..Default::default()
        };
        config.list_page.wait_selector = Some(".item".to_string());

        let options = BrowserOptions::from_config(&config);
        assert!(!options.headless);
        assert_eq!(options.timeout, 30);
        assert_eq!(options.base_url, "https://example.com/");
    }

    #[cfg(feature = "browser")]
    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string(r#"a[href="x"]"#), r#""a[href=\"x\"]""#);
    }
}
