//! Structured crawl diagnostics.
//!
//! The engine reports what it does as [`CrawlEvent`]s sent to an
//! [`EventSink`]. The default sink renders them through `tracing`.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

/// Why a strategy loop or coordinator stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The first fetch failed, nothing was collected.
    FirstFetchFailed,
    /// `max_total_items` reached.
    CapReached,
    MaxPages,
    NoNextPage,
    NoItems,
    HeightUnchanged,
    MaxScrolls,
    NoNewItems,
    ControlMissing,
    MaxClicks,
    IdleRounds,
    /// Every dispatched unit has reported back.
    Exhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::FirstFetchFailed => "first fetch failed",
            StopReason::CapReached => "item cap reached",
            StopReason::MaxPages => "max pages reached",
            StopReason::NoNextPage => "no next page",
            StopReason::NoItems => "page yielded no items",
            StopReason::HeightUnchanged => "page height stopped growing",
            StopReason::MaxScrolls => "max scroll attempts reached",
            StopReason::NoNewItems => "no new items",
            StopReason::ControlMissing => "load-more control unavailable",
            StopReason::MaxClicks => "max clicks reached",
            StopReason::IdleRounds => "too many rounds without new items",
            StopReason::Exhausted => "all pages processed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    FetchStarted { url: String },
    FetchFailed { url: String, error: String },
    ItemsExtracted { round: u32, count: usize },
    DuplicateSkipped { key: String },
    RecordsAppended { added: usize, total: usize },
    DetailFailed { url: String, error: String },
    WorkerFailed { page: u32, error: String },
    Stopped { reason: StopReason, total: usize },
}

/// Receiver for crawl events. Must be cheap; it is called inline.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &CrawlEvent);
}

/// Logs every event with `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &CrawlEvent) {
        match event {
            CrawlEvent::FetchStarted { url } => info!("Fetching {}", url),
            CrawlEvent::FetchFailed { url, error } => warn!("Fetch failed for {}: {}", url, error),
            CrawlEvent::ItemsExtracted { round, count } => {
                info!("Round {}: extracted {} items", round, count)
            }
            CrawlEvent::DuplicateSkipped { key } => debug!("Skipping duplicate: {}", key),
            CrawlEvent::RecordsAppended { added, total } => {
                info!("Added {} records ({} total)", added, total)
            }
            CrawlEvent::DetailFailed { url, error } => {
                warn!("Detail page failed for {}: {}", url, error)
            }
            CrawlEvent::WorkerFailed { page, error } => {
                warn!("Worker failed on page {}: {}", page, error)
            }
            CrawlEvent::Stopped { reason, total } => {
                info!("Crawl stopped ({}), {} records", reason, total)
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<CrawlEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CrawlEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// The reason carried by the last `Stopped` event, if any.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.events().iter().rev().find_map(|e| match e {
            CrawlEvent::Stopped { reason, .. } => Some(*reason),
            _ => None,
        })
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &CrawlEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
