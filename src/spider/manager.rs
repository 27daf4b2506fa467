//! Running many spider configs from one directory.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use super::Spider;
use crate::config::SpiderConfig;
use crate::error::ConfigError;
use crate::output::{DataSaver, OutputFormat};

pub const DEFAULT_CONFIG_DIR: &str = "configs";
pub const DEFAULT_MANAGER_OUTPUT_DIR: &str = "output";
pub const DEFAULT_MAX_WORKERS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

/// Outcome of one config's run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub config_name: String,
    pub status: RunStatus,
    pub data_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    fn failed(config_name: &str, error: impl ToString) -> Self {
        Self {
            config_name: config_name.to_string(),
            status: RunStatus::Failed,
            data_count: 0,
            output_path: None,
            error: Some(error.to_string()),
        }
    }
}

/// Starter config shapes for `create_template`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateKind {
    /// Paged product or article listing with detail pages.
    #[default]
    Listing,
    /// Endless feed driven by scrolling.
    Feed,
}

impl TemplateKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "listing" => Some(Self::Listing),
            "feed" => Some(Self::Feed),
            _ => None,
        }
    }
}

pub struct SpiderManager {
    config_dir: PathBuf,
    output_dir: PathBuf,
    max_workers: usize,
}

impl Default for SpiderManager {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_DIR, DEFAULT_MANAGER_OUTPUT_DIR)
    }
}

impl SpiderManager {
    pub fn new(config_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            output_dir: output_dir.into(),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Names (file stems) of every `*.json` config, sorted.
    pub fn list_configs(&self) -> Result<Vec<String>, ConfigError> {
        if !self.config_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.config_dir).map_err(|source| ConfigError::Io {
            path: self.config_dir.clone(),
            source,
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
            .collect();
        names.sort();
        Ok(names)
    }

    fn config_path(&self, name: &str) -> PathBuf {
        self.config_dir.join(format!("{}.json", name))
    }

    /// Load, crawl and save one named config. Never fails; problems land in the report.
    pub async fn run_one(&self, name: &str) -> RunReport {
        info!("Running spider: {}", name);
        let config = match SpiderConfig::from_path(&self.config_path(name)) {
            Ok(c) => c,
            Err(e) => {
                error!("Spider {} failed: {}", name, e);
                return RunReport::failed(name, e);
            }
        };
        self.run_config(name, config).await
    }

    /// Crawl and save an already loaded config.
    pub async fn run_config(&self, name: &str, config: SpiderConfig) -> RunReport {
        let format = match OutputFormat::parse(&config.output_format) {
            Ok(f) => f,
            Err(e) => return RunReport::failed(name, e),
        };
        let output_path = config.output_path.clone();
        let spider_name = config.name.clone();

        let spider = match Spider::new(config) {
            Ok(s) => s,
            Err(e) => {
                error!("Spider {} failed: {}", name, e);
                return RunReport::failed(name, e);
            }
        };

        let records = match spider.crawl().await {
            Ok(r) => r,
            Err(e) => {
                error!("Spider {} failed: {}", name, e);
                return RunReport::failed(name, e);
            }
        };

        let saver = DataSaver::new(&self.output_dir);
        let saved = match saver.save(&records, &spider_name, format, output_path.as_deref()) {
            Ok(p) => p,
            Err(e) => {
                error!("Saving results of {} failed: {}", name, e);
                return RunReport::failed(name, e);
            }
        };

        info!("Spider {} done, {} records", name, records.len());
        RunReport {
            config_name: name.to_string(),
            status: RunStatus::Success,
            data_count: records.len(),
            output_path: saved,
            error: None,
        }
    }

    /// Run the named configs, at most `max_workers` at a time, in completion order.
    pub async fn run_many(&self, names: &[String]) -> Vec<RunReport> {
        info!(
            "Running {} spiders ({} at a time)",
            names.len(),
            self.max_workers
        );
        stream::iter(names)
            .map(|name| self.run_one(name))
            .buffer_unordered(self.max_workers)
            .collect()
            .await
    }

    /// Run every config in the config directory.
    pub async fn run_all(&self) -> Result<Vec<RunReport>, ConfigError> {
        let names = self.list_configs()?;
        if names.is_empty() {
            warn!("No configs found in {}", self.config_dir.display());
            return Ok(Vec::new());
        }
        Ok(self.run_many(&names).await)
    }

    /// Write a starter config named `name`. Refuses to overwrite an existing file.
    pub fn create_template(&self, name: &str, kind: TemplateKind) -> Result<PathBuf, ConfigError> {
        let path = self.config_path(name);
        let io_err = |source| ConfigError::Io {
            path: path.clone(),
            source,
        };
        if path.exists() {
            return Err(io_err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "config already exists",
            )));
        }
        std::fs::create_dir_all(&self.config_dir).map_err(io_err)?;

        let template = template(name, kind);
        let text = serde_json::to_string_pretty(&template).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, text).map_err(io_err)?;
        info!("Created config template {}", path.display());
        Ok(path)
    }
}

fn template(name: &str, kind: TemplateKind) -> serde_json::Value {
    match kind {
        TemplateKind::Listing => json!({
            "name": name,
            "mode": "browser",
            "base_url": "https://example.com/products?q=keyword",
            "delay": 2.0,
            "timeout": 30,
            "max_pages": 20,
            "max_total_items": 200,
            "concurrent": 3,
            "list_page": {
                "item_selector": ".product",
                "wait_selector": ".product",
                "fields": [
                    {"name": "title", "selector": ".title", "attribute": "text"},
                    {"name": "price", "selector": ".price", "attribute": "text"},
                    {"name": "url", "selector": "a", "attribute": "href"},
                    {"name": "image", "selector": "img", "attribute": "src"}
                ]
            },
            "detail_page": {
                "enabled": true,
                "url_field": "url",
                "fields": [
                    {"name": "description", "selector": ".description", "attribute": "text"}
                ]
            },
            "pagination": {"type": "url", "param": "page", "next_selector": ".pagination .next"},
            "output_format": "json",
            "output_path": format!("output/{}.json", name)
        }),
        TemplateKind::Feed => json!({
            "name": name,
            "mode": "browser",
            "base_url": "https://example.com/feed",
            "delay": 3.0,
            "timeout": 30,
            "max_total_items": 100,
            "list_page": {
                "item_selector": ".note-item",
                "wait_selector": ".note-item",
                "fields": [
                    {"name": "title", "selector": ".title", "attribute": "text"},
                    {"name": "author", "selector": ".author", "attribute": "text"},
                    {"name": "likes", "selector": ".like", "attribute": "text"},
                    {"name": "url", "selector": "a", "attribute": "href"}
                ]
            },
            "custom_pagination": {
                "type": "feed",
                "loading_selector": ".loading",
                "scroll_pause_time": 3,
                "max_scroll_attempts": 50,
                "max_idle_rounds": 5
            },
            "output_format": "json",
            "output_path": format!("output/{}.json", name)
        }),
    }
}
