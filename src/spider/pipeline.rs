//! Shared per-iteration pipeline: extract, dedupe, resolve details, append.

use std::sync::Arc;

use tracing::{debug, warn};

use super::detail::DetailResolver;
use crate::config::SpiderConfig;
use crate::dedup::DedupTracker;
use crate::error::FetchError;
use crate::events::{CrawlEvent, EventSink};
use crate::extract::extract_records;
use crate::fetch::{FetcherFactory, Page, PageFetcher};
use crate::models::{Record, ResultSet};

/// Outcome of absorbing one page into the result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    /// Items found on the page, duplicates included.
    pub extracted: usize,
    /// Records actually appended.
    pub added: usize,
    /// The result set reached `max_total_items`.
    pub capped: bool,
}

/// Navigate to a list page and wait for its `wait_selector`, if any, before reading.
///
/// Detail pages go through plain [`PageFetcher::fetch`] and never wait on it.
pub async fn fetch_list_page(
    fetcher: &mut dyn PageFetcher,
    url: &str,
    config: &SpiderConfig,
) -> Result<Page, FetchError> {
    fetcher.navigate(url).await?;
    if let Some(ref selector) = config.list_page.wait_selector {
        match fetcher.wait_for(selector, config.timeout_duration()).await {
            Ok(true) => {}
            Ok(false) => warn!("Timeout waiting for selector {} on {}", selector, url),
            Err(FetchError::Unsupported(_)) => debug!("Backend cannot wait for {}", selector),
            Err(e) => return Err(e),
        }
    }
    fetcher.content().await
}

/// Mutable state of one sequential crawl.
///
/// Owns the list fetcher driven by the strategy, plus a second fetcher for
/// detail pages, created on first use so detail navigation never disturbs the
/// scroll or click state of the list page.
pub struct CrawlContext {
    config: Arc<SpiderConfig>,
    fetcher: Box<dyn PageFetcher>,
    factory: Arc<dyn FetcherFactory>,
    detail_fetcher: Option<Box<dyn PageFetcher>>,
    detail_unavailable: bool,
    sink: Arc<dyn EventSink>,
    results: ResultSet,
    tracker: DedupTracker,
    current_url: String,
    round: u32,
}

impl CrawlContext {
    pub fn new(
        config: Arc<SpiderConfig>,
        fetcher: Box<dyn PageFetcher>,
        factory: Arc<dyn FetcherFactory>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            fetcher,
            factory,
            detail_fetcher: None,
            detail_unavailable: false,
            sink,
            results: ResultSet::new(),
            tracker: DedupTracker::new(),
            current_url: String::new(),
            round: 0,
        }
    }

    pub fn fetcher(&mut self) -> &mut dyn PageFetcher {
        self.fetcher.as_mut()
    }

    pub fn emit(&self, event: CrawlEvent) {
        self.sink.emit(&event);
    }

    /// Navigate the list fetcher to `url` and read it. Failures are reported and give None.
    pub async fn load(&mut self, url: &str) -> Option<Page> {
        self.current_url = url.to_string();
        self.emit(CrawlEvent::FetchStarted {
            url: url.to_string(),
        });
        match fetch_list_page(self.fetcher.as_mut(), url, &self.config).await {
            Ok(page) => Some(page),
            Err(e) => {
                self.emit(CrawlEvent::FetchFailed {
                    url: url.to_string(),
                    error: e.to_string(),
                });
                None
            }
        }
    }

    /// Read the list fetcher's current page without navigating.
    pub async fn read(&mut self) -> Option<Page> {
        match self.fetcher.content().await {
            Ok(page) => Some(page),
            Err(e) => {
                self.report_failure(&e);
                None
            }
        }
    }

    /// Report a failed operation on the current list page.
    pub fn report_failure(&self, error: &FetchError) {
        self.emit(CrawlEvent::FetchFailed {
            url: self.current_url.clone(),
            error: error.to_string(),
        });
    }

    fn remaining(&self) -> Option<usize> {
        match self.config.max_total_items {
            0 => None,
            max => Some(max.saturating_sub(self.results.len())),
        }
    }

    /// Run one page through extraction, dedup, detail resolution and append.
    pub async fn absorb(&mut self, page: &Page) -> RoundSummary {
        self.round += 1;
        let records = extract_records(
            page,
            &self.config.list_page,
            &self.config.base_url,
            self.config.detail(),
        );
        let extracted = records.len();
        self.emit(CrawlEvent::ItemsExtracted {
            round: self.round,
            count: extracted,
        });

        let mut round_keys = DedupTracker::new();
        let mut fresh: Vec<Record> = Vec::with_capacity(extracted);
        for record in records {
            if !self.tracker.is_duplicate(&record) && round_keys.insert(&record) {
                fresh.push(record);
            } else {
                self.emit(CrawlEvent::DuplicateSkipped {
                    key: record.identity_key(),
                });
            }
        }

        if let Some(remaining) = self.remaining() {
            fresh.truncate(remaining);
        }

        if !fresh.is_empty() {
            self.resolve_details(&mut fresh).await;
        }

        // Detail fields may rewrite a record's identity; the tracker follows
        // the records as appended.
        let mut kept: Vec<Record> = Vec::with_capacity(fresh.len());
        for record in fresh {
            if self.tracker.insert(&record) {
                kept.push(record);
            } else {
                self.emit(CrawlEvent::DuplicateSkipped {
                    key: record.identity_key(),
                });
            }
        }

        let added = kept.len();
        self.results.extend(kept);
        if added > 0 {
            self.emit(CrawlEvent::RecordsAppended {
                added,
                total: self.results.len(),
            });
        }

        RoundSummary {
            extracted,
            added,
            capped: self.remaining() == Some(0),
        }
    }

    async fn resolve_details(&mut self, records: &mut [Record]) {
        let Some(detail) = self.config.detail() else {
            return;
        };
        if records.iter().all(|r| r.detail_url.is_none()) {
            return;
        }

        if self.detail_fetcher.is_none() && !self.detail_unavailable {
            match self.factory.create().await {
                Ok(fetcher) => self.detail_fetcher = Some(fetcher),
                Err(e) => {
                    warn!("Could not provision detail fetcher: {}", e);
                    self.detail_unavailable = true;
                }
            }
        }

        match self.detail_fetcher.as_mut() {
            Some(fetcher) => {
                DetailResolver::new(detail, self.config.delay_duration(), self.sink.as_ref())
                    .resolve(fetcher.as_mut(), records)
                    .await
            }
            None => {
                for record in records.iter_mut() {
                    if let Some(url) = record.detail_url.take() {
                        self.sink.emit(&CrawlEvent::DetailFailed {
                            url,
                            error: "detail fetcher unavailable".to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Close every fetcher this crawl owns and hand back the records.
    pub async fn finish(mut self) -> ResultSet {
        self.fetcher.close().await;
        if let Some(mut detail) = self.detail_fetcher.take() {
            detail.close().await;
        }
        self.results
    }
}
