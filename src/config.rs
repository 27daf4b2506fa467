//! Spider configuration types.
//!
//! These structs define the JSON-configurable behavior of a spider: which
//! site to visit, how list and detail pages map to record fields, and which
//! pagination strategy drives the crawl.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Spider configuration from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiderConfig {
    #[serde(default)]
    pub name: String,
    /// Fetch backend: "api" (HTTP + JSON) or "browser" (rendered markup).
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Extra query parameters sent with every list request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, serde_json::Value>,
    /// Path to a browser-exported cookies JSON file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies_file: Option<PathBuf>,
    #[serde(default)]
    pub list_page: ListPageConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_page: Option<DetailPageConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationConfig>,
    /// Site-specific pagination; takes precedence over `pagination`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_pagination: Option<CustomPaginationConfig>,
    /// Pause between iterations, in seconds.
    #[serde(default = "default_delay")]
    pub delay: f64,
    /// Per-fetch timeout, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Upper bound on the result set size (0 = unbounded).
    #[serde(default)]
    pub max_total_items: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Worker count for concurrent page crawling (capped at 10).
    #[serde(default = "default_concurrent")]
    pub concurrent: usize,
    /// Attempts per HTTP request before the fetch is reported as failed.
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            mode: String::new(),
            base_url: String::new(),
            headers: BTreeMap::new(),
            params: BTreeMap::new(),
            cookies_file: None,
            list_page: ListPageConfig::default(),
            detail_page: None,
            pagination: None,
            custom_pagination: None,
            delay: default_delay(),
            timeout: default_timeout(),
            max_pages: default_max_pages(),
            max_total_items: 0,
            proxy: None,
            user_agent: None,
            concurrent: default_concurrent(),
            retry_times: default_retry_times(),
            headless: default_headless(),
            output_format: default_output_format(),
            output_path: None,
        }
    }
}

fn default_delay() -> f64 {
    1.0
}
fn default_timeout() -> u64 {
    30
}
fn default_max_pages() -> u32 {
    10
}
fn default_concurrent() -> usize {
    1
}
fn default_retry_times() -> u32 {
    3
}
fn default_headless() -> bool {
    true
}
fn default_output_format() -> String {
    "json".to_string()
}

/// How one named field is pulled out of an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub name: String,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub attribute: Attribute,
}

impl FieldMapping {
    pub fn new(name: &str, selector: &str, attribute: Attribute) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            attribute,
        }
    }
}

/// What to read from a matched markup element.
///
/// Serialized as a plain string: `"text"`, `"html"`, or any attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Attribute {
    #[default]
    Text,
    Html,
    Named(String),
}

impl From<String> for Attribute {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" | "text" => Attribute::Text,
            "html" => Attribute::Html,
            _ => Attribute::Named(value),
        }
    }
}

impl From<Attribute> for String {
    fn from(value: Attribute) -> Self {
        match value {
            Attribute::Text => "text".to_string(),
            Attribute::Html => "html".to_string(),
            Attribute::Named(name) => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPageConfig {
    /// Markup query selecting one element per item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_selector: Option<String>,
    /// Dotted JSON path to the item array (api mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_selector: Option<String>,
    /// Element that must be present before the page counts as loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_selector: Option<String>,
    /// Link inside each item pointing at its detail page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_selector: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailPageConfig {
    #[serde(default)]
    pub enabled: bool,
    /// List field whose value is the detail page link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(rename = "type", default = "default_pagination_type")]
    pub pagination_type: String,
    #[serde(default = "default_page_param")]
    pub param: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    /// Markup query for the "next page" control.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_selector: Option<String>,
    /// Dotted JSON path to a "has more" flag (api mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more_path: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_scroll_attempts: u32,
    #[serde(default = "default_pause")]
    pub scroll_pause: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_more_selector: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_clicks: u32,
    #[serde(default = "default_pause")]
    pub click_wait: f64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            pagination_type: default_pagination_type(),
            param: default_page_param(),
            size_param: None,
            size: None,
            next_selector: None,
            has_more_path: None,
            max_scroll_attempts: default_max_attempts(),
            scroll_pause: default_pause(),
            load_more_selector: None,
            max_clicks: default_max_attempts(),
            click_wait: default_pause(),
        }
    }
}

fn default_pagination_type() -> String {
    "url".to_string()
}
fn default_page_param() -> String {
    "page".to_string()
}
fn default_max_attempts() -> u32 {
    10
}
fn default_pause() -> f64 {
    2.0
}

/// Site-tuned pagination for endless feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPaginationConfig {
    #[serde(rename = "type")]
    pub pagination_type: String,
    /// Spinner shown while the feed loads more entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading_selector: Option<String>,
    #[serde(default = "default_feed_pause")]
    pub scroll_pause_time: f64,
    #[serde(default = "default_feed_attempts")]
    pub max_scroll_attempts: u32,
    /// Consecutive rounds without new items before the feed counts as exhausted.
    #[serde(default = "default_idle_rounds")]
    pub max_idle_rounds: u32,
    /// Upward nudge applied before each scroll to trigger lazy loading.
    #[serde(default = "default_scroll_back")]
    pub scroll_back_px: i64,
}

impl CustomPaginationConfig {
    pub fn new(pagination_type: &str) -> Self {
        Self {
            pagination_type: pagination_type.to_string(),
            loading_selector: None,
            scroll_pause_time: default_feed_pause(),
            max_scroll_attempts: default_feed_attempts(),
            max_idle_rounds: default_idle_rounds(),
            scroll_back_px: default_scroll_back(),
        }
    }
}

fn default_feed_pause() -> f64 {
    3.0
}
fn default_feed_attempts() -> u32 {
    50
}
fn default_idle_rounds() -> u32 {
    5
}
fn default_scroll_back() -> i64 {
    300
}

/// Fetch backend selected by `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiderMode {
    Api,
    Browser,
}

/// Pagination strategy selected from `custom_pagination` / `pagination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationKind {
    Url,
    Scroll,
    Click,
    Feed,
}

impl PaginationKind {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.to_lowercase().as_str() {
            "url" => Ok(Self::Url),
            "scroll" | "infinite_scroll" | "dynamic_scroll" => Ok(Self::Scroll),
            "click" | "load_more" => Ok(Self::Click),
            "feed" | "xiaohongshu" => Ok(Self::Feed),
            other => Err(ConfigError::UnsupportedPagination(other.to_string())),
        }
    }
}

impl SpiderConfig {
    /// Load a config from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check required fields and enumerated values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField("name"));
        }
        if self.mode.trim().is_empty() {
            return Err(ConfigError::MissingField("mode"));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField("base_url"));
        }
        self.spider_mode()?;
        url::Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        })?;
        self.pagination_kind()?;
        match self.output_format.to_lowercase().as_str() {
            "json" | "csv" => Ok(()),
            other => Err(ConfigError::UnsupportedOutput(other.to_string())),
        }
    }

    pub fn spider_mode(&self) -> Result<SpiderMode, ConfigError> {
        match self.mode.to_lowercase().as_str() {
            "api" => Ok(SpiderMode::Api),
            "browser" => Ok(SpiderMode::Browser),
            other => Err(ConfigError::UnsupportedMode(other.to_string())),
        }
    }

    /// `custom_pagination.type` wins over `pagination.type`, which defaults to "url".
    pub fn pagination_kind(&self) -> Result<PaginationKind, ConfigError> {
        if let Some(ref custom) = self.custom_pagination {
            return PaginationKind::parse(&custom.pagination_type);
        }
        match self.pagination {
            Some(ref p) => PaginationKind::parse(&p.pagination_type),
            None => Ok(PaginationKind::Url),
        }
    }

    /// Detail settings, only when enrichment is switched on.
    pub fn detail(&self) -> Option<&DetailPageConfig> {
        self.detail_page.as_ref().filter(|d| d.enabled)
    }

    pub fn delay_duration(&self) -> Duration {
        secs(self.delay)
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Worker pool size for concurrent crawling.
    pub fn worker_count(&self) -> usize {
        self.concurrent.clamp(1, 10)
    }
}

/// Seconds as a `Duration`, treating negative or NaN values as zero and
/// saturating values too large to represent.
pub fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}
