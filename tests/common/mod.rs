//! Scripted in-memory fetch backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use smartspider::config::{Attribute, FieldMapping, ListPageConfig, SpiderConfig};
use smartspider::fetch::{FetcherFactory, Page, PageFetcher};
use smartspider::FetchError;

pub const BASE_URL: &str = "https://shop.test/list";

/// What every fetcher built from one factory will serve.
#[derive(Debug, Default, Clone)]
pub struct Script {
    /// Content served after navigating to a URL.
    pub pages: HashMap<String, Page>,
    /// Content of the loaded page after the n-th scroll or click (1-based, clamped).
    pub stages: Vec<Page>,
    /// Page height before any scroll, then after each scroll (clamped).
    pub heights: Vec<u64>,
    /// Successful clicks before the control disappears.
    pub clickable: usize,
    /// URLs whose fetch panics inside the fetcher.
    pub panic_urls: HashSet<String>,
}

impl Script {
    pub fn page(mut self, url: &str, page: Page) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
    pub navigations: AtomicUsize,
    pub scrolls: AtomicUsize,
    pub clicks: AtomicUsize,
    pub waits: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct ScriptedFetcher {
    script: Arc<Script>,
    counters: Arc<Counters>,
    current: Option<Page>,
    stage: usize,
    clicks: usize,
}

impl ScriptedFetcher {
    fn staged(&self) -> Option<Page> {
        if self.stage == 0 || self.script.stages.is_empty() {
            return self.current.clone();
        }
        let index = (self.stage - 1).min(self.script.stages.len() - 1);
        Some(self.script.stages[index].clone())
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        self.counters.navigations.fetch_add(1, Ordering::SeqCst);
        if self.script.panic_urls.contains(url) {
            panic!("scripted panic for {}", url);
        }
        match self.script.pages.get(url) {
            Some(page) => {
                self.current = Some(page.clone());
                self.stage = 0;
                Ok(())
            }
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    async fn content(&mut self) -> Result<Page, FetchError> {
        self.staged()
            .ok_or(FetchError::Browser("nothing loaded".to_string()))
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), FetchError> {
        self.counters.scrolls.fetch_add(1, Ordering::SeqCst);
        self.stage += 1;
        Ok(())
    }

    async fn scroll_by(&mut self, _dy: i64) -> Result<(), FetchError> {
        Ok(())
    }

    async fn page_height(&mut self) -> Result<u64, FetchError> {
        let heights = &self.script.heights;
        if heights.is_empty() {
            return Ok(0);
        }
        Ok(heights[self.stage.min(heights.len() - 1)])
    }

    async fn click(&mut self, _selector: &str) -> Result<bool, FetchError> {
        self.counters.clicks.fetch_add(1, Ordering::SeqCst);
        if self.clicks >= self.script.clickable {
            return Ok(false);
        }
        self.clicks += 1;
        self.stage += 1;
        Ok(true)
    }

    async fn wait_for(&mut self, _selector: &str, _timeout: Duration) -> Result<bool, FetchError> {
        self.counters.waits.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }

    async fn close(&mut self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct ScriptedFactory {
    pub script: Arc<Script>,
    pub counters: Arc<Counters>,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Arc::new(script),
            counters: Arc::new(Counters::default()),
        })
    }
}

#[async_trait]
impl FetcherFactory for ScriptedFactory {
    async fn create(&self) -> Result<Box<dyn PageFetcher>, FetchError> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedFetcher {
            script: self.script.clone(),
            counters: self.counters.clone(),
            current: None,
            stage: 0,
            clicks: 0,
        }))
    }
}

/// Markup listing with one `.item` per `(title, href)` and an optional next link.
pub fn listing(items: &[(&str, &str)], has_next: bool) -> Page {
    let mut html = String::from("<html><body><div class=\"list\">");
    for (title, href) in items {
        html.push_str(&format!(
            "<div class=\"item\"><a class=\"title\" href=\"{}\">{}</a><span class=\"price\">9.99</span></div>",
            href, title
        ));
    }
    html.push_str("</div>");
    if has_next {
        html.push_str("<a class=\"next\" href=\"?page=next\">Next</a>");
    }
    html.push_str("</body></html>");
    Page::Html(html)
}

/// `count` items numbered from `start`, hrefs `/p/<n>`.
pub fn items(start: usize, count: usize) -> Vec<(String, String)> {
    (start..start + count)
        .map(|n| (format!("Item {}", n), format!("/p/{}", n)))
        .collect()
}

pub fn listing_of(items: &[(String, String)], has_next: bool) -> Page {
    let borrowed: Vec<(&str, &str)> = items
        .iter()
        .map(|(t, h)| (t.as_str(), h.as_str()))
        .collect();
    listing(&borrowed, has_next)
}

/// Browser-mode config over `.item` elements with no pauses.
pub fn base_config() -> SpiderConfig {
    SpiderConfig {
        name: "scripted".to_string(),
        mode: "browser".to_string(),
        base_url: BASE_URL.to_string(),
        delay: 0.0,
        list_page: ListPageConfig {
            item_selector: Some(".item".to_string()),
            fields: vec![
                FieldMapping::new("title", ".title", Attribute::Text),
                FieldMapping::new("url", ".title", Attribute::Named("href".to_string())),
                FieldMapping::new("price", ".price", Attribute::Text),
            ],
            ..Default::default()
        },
        ..Default::default()
    }
}

/// `BASE_URL` for page 1, `BASE_URL?page=n` after.
pub fn page_link(page: u32) -> String {
    if page == 1 {
        BASE_URL.to_string()
    } else {
        format!("{}?page={}", BASE_URL, page)
    }
}
