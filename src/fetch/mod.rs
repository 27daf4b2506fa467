//! Page fetch backends.
//!
//! The crawl engine only talks to [`PageFetcher`]. `HttpFetcher` serves api
//! mode; `BrowserFetcher` drives Chrome for rendered pages when the `browser`
//! feature is enabled.

pub mod browser;
pub mod cookies;
pub mod http;

pub use browser::{BrowserFetcher, BrowserOptions};
pub use cookies::{load_cookies, Cookie};
pub use http::HttpFetcher;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{SpiderConfig, SpiderMode};
use crate::error::FetchError;

/// Content of the current page.
#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    /// Rendered or raw markup.
    Html(String),
    /// Decoded JSON body.
    Json(Value),
}

/// A stateful page-fetch capability.
///
/// `navigate` loads a URL; `content` reads whatever is currently loaded.
/// Scroll and click primitives are only needed by the scroll, click and feed
/// pagination strategies; backends without them keep the defaults, which
/// return [`FetchError::Unsupported`].
#[async_trait]
pub trait PageFetcher: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError>;

    async fn content(&mut self) -> Result<Page, FetchError>;

    /// Navigate and read in one step.
    async fn fetch(&mut self, url: &str) -> Result<Page, FetchError> {
        self.navigate(url).await?;
        self.content().await
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), FetchError> {
        Err(FetchError::Unsupported("scroll_to_bottom"))
    }

    /// Scroll vertically by `dy` pixels; negative scrolls up.
    async fn scroll_by(&mut self, _dy: i64) -> Result<(), FetchError> {
        Err(FetchError::Unsupported("scroll_by"))
    }

    /// Current document scroll height in pixels.
    async fn page_height(&mut self) -> Result<u64, FetchError> {
        Err(FetchError::Unsupported("page_height"))
    }

    /// Click the first element matching `selector`. Ok(false) when absent.
    async fn click(&mut self, _selector: &str) -> Result<bool, FetchError> {
        Err(FetchError::Unsupported("click"))
    }

    /// Wait until `selector` matches or `timeout` passes. Ok(false) on timeout.
    async fn wait_for(&mut self, _selector: &str, _timeout: Duration) -> Result<bool, FetchError> {
        Err(FetchError::Unsupported("wait_for"))
    }

    /// Release the backend. Called exactly once by whoever provisioned it.
    async fn close(&mut self) {}
}

/// Provisions fresh fetchers, one per worker or role.
#[async_trait]
pub trait FetcherFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn PageFetcher>, FetchError>;
}

/// Builds the backend matching the config's `mode`.
#[derive(Debug, Clone)]
pub struct ConfigFetcherFactory {
    config: Arc<SpiderConfig>,
}

impl ConfigFetcherFactory {
    pub fn new(config: Arc<SpiderConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FetcherFactory for ConfigFetcherFactory {
    async fn create(&self) -> Result<Box<dyn PageFetcher>, FetchError> {
        let mode = self
            .config
            .spider_mode()
            .map_err(|e| FetchError::Browser(e.to_string()))?;
        match mode {
            SpiderMode::Api => Ok(Box::new(HttpFetcher::from_config(&self.config)?)),
            SpiderMode::Browser if browser::AVAILABLE => {
                let mut fetcher = BrowserFetcher::new(BrowserOptions::from_config(&self.config));
                fetcher.launch().await?;
                Ok(Box::new(fetcher))
            }
            SpiderMode::Browser => {
                tracing::warn!("Browser support not compiled, fetching raw markup over HTTP");
                Ok(Box::new(HttpFetcher::from_config(&self.config)?.markup_only()))
            }
        }
    }
}
