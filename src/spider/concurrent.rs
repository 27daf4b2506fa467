//! Page-parallel crawling for URL pagination.
//!
//! Each page number becomes one unit of work. A fixed pool of workers pulls
//! units from a shared queue; every worker provisions its own fetcher and
//! closes it when the queue drains. Results come back over a channel and are
//! merged by the coordinator alone, in completion order.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::detail::DetailResolver;
use super::pipeline::fetch_list_page;
use super::strategy::page_url;
use crate::config::SpiderConfig;
use crate::dedup::dedup_records;
use crate::events::{CrawlEvent, EventSink, StopReason};
use crate::extract::extract_records;
use crate::fetch::{FetcherFactory, PageFetcher};
use crate::models::{Record, ResultSet};

/// One page to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchUnit {
    pub page: u32,
    pub url: String,
    /// Most records this page may contribute (0 = no limit).
    pub cap: usize,
}

type UnitResult = (u32, Result<Vec<Record>, String>);

pub struct ConcurrentCoordinator {
    config: Arc<SpiderConfig>,
    factory: Arc<dyn FetcherFactory>,
    sink: Arc<dyn EventSink>,
}

impl ConcurrentCoordinator {
    pub fn new(
        config: Arc<SpiderConfig>,
        factory: Arc<dyn FetcherFactory>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            factory,
            sink,
        }
    }

    /// Split `1..=max_pages` into units with a per-page share of the total cap.
    ///
    /// A share that rounds down to 0 leaves pages uncapped; `run` still
    /// truncates the merged set to `max_total_items`.
    pub fn partition(config: &SpiderConfig) -> Vec<FetchUnit> {
        let pages = config.max_pages;
        let cap = match (config.max_total_items, pages) {
            (0, _) | (_, 0) => 0,
            (total, pages) => total / pages as usize,
        };
        (1..=pages)
            .map(|page| FetchUnit {
                page,
                url: page_url(config, page),
                cap,
            })
            .collect()
    }

    /// Crawl every page with a bounded worker pool and merge the results.
    pub async fn run(&self) -> ResultSet {
        let units = Self::partition(&self.config);
        let worker_count = self.config.worker_count().min(units.len());
        let limit = self.config.max_total_items;

        if worker_count == 0 {
            self.sink.emit(&CrawlEvent::Stopped {
                reason: StopReason::Exhausted,
                total: 0,
            });
            return ResultSet::new();
        }

        info!(
            "Crawling {} pages with {} workers",
            units.len(),
            worker_count
        );

        let (unit_tx, unit_rx) = mpsc::channel::<FetchUnit>(worker_count);
        let (result_tx, mut result_rx) = mpsc::channel::<UnitResult>(worker_count);
        let handles = self.spawn_workers(worker_count, unit_rx, result_tx);

        let mut pending = units.into_iter();
        let mut in_flight = 0usize;
        for unit in pending.by_ref().take(worker_count) {
            if unit_tx.send(unit).await.is_err() {
                break;
            }
            in_flight += 1;
        }

        let mut results = ResultSet::new();
        let mut reason = StopReason::Exhausted;
        while in_flight > 0 {
            let Some((page, outcome)) = result_rx.recv().await else {
                break;
            };
            in_flight -= 1;

            let cap_met = limit > 0 && results.len() >= limit;
            match outcome {
                Ok(_) if cap_met => debug!("Discarding page {}: item cap already met", page),
                Ok(records) => {
                    let added = records.len();
                    results.extend(records);
                    self.sink.emit(&CrawlEvent::RecordsAppended {
                        added,
                        total: results.len(),
                    });
                }
                Err(error) => self.sink.emit(&CrawlEvent::WorkerFailed { page, error }),
            }

            if limit > 0 && results.len() >= limit {
                reason = StopReason::CapReached;
                continue;
            }
            if let Some(unit) = pending.next() {
                if unit_tx.send(unit).await.is_ok() {
                    in_flight += 1;
                }
            }
        }

        // Workers exit once the queue is closed; wait so every fetcher is closed.
        drop(unit_tx);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Worker task ended abnormally: {}", e);
            }
        }

        let mut results = dedup_records(results);
        if limit > 0 {
            results.truncate(limit);
        }
        self.sink.emit(&CrawlEvent::Stopped {
            reason,
            total: results.len(),
        });
        results
    }

    fn spawn_workers(
        &self,
        count: usize,
        unit_rx: mpsc::Receiver<FetchUnit>,
        result_tx: mpsc::Sender<UnitResult>,
    ) -> Vec<JoinHandle<()>> {
        let unit_rx = Arc::new(tokio::sync::Mutex::new(unit_rx));
        let mut handles = Vec::with_capacity(count);

        for _ in 0..count {
            let unit_rx = unit_rx.clone();
            let result_tx = result_tx.clone();
            let config = self.config.clone();
            let factory = self.factory.clone();
            let sink = self.sink.clone();

            let handle = tokio::spawn(async move {
                let mut fetcher = match factory.create().await {
                    Ok(f) => Ok(f),
                    Err(e) => Err(format!("fetcher unavailable: {}", e)),
                };

                loop {
                    let unit = {
                        let mut rx = unit_rx.lock().await;
                        rx.recv().await
                    };
                    let Some(unit) = unit else {
                        break;
                    };

                    let outcome = match fetcher {
                        Ok(ref mut f) => {
                            let work = process_unit(f.as_mut(), &unit, &config, sink.as_ref());
                            match AssertUnwindSafe(work).catch_unwind().await {
                                Ok(outcome) => outcome,
                                Err(_) => Err("worker panicked".to_string()),
                            }
                        }
                        Err(ref e) => Err(e.clone()),
                    };

                    if result_tx.send((unit.page, outcome)).await.is_err() {
                        break;
                    }
                }

                if let Ok(ref mut f) = fetcher {
                    f.close().await;
                }
            });

            handles.push(handle);
        }

        handles
    }
}

/// Fetch one page, extract up to its cap, and resolve details, all locally.
async fn process_unit(
    fetcher: &mut dyn PageFetcher,
    unit: &FetchUnit,
    config: &SpiderConfig,
    sink: &dyn EventSink,
) -> Result<Vec<Record>, String> {
    sink.emit(&CrawlEvent::FetchStarted {
        url: unit.url.clone(),
    });
    let page = fetch_list_page(fetcher, &unit.url, config)
        .await
        .map_err(|e| e.to_string())?;

    let mut records = extract_records(
        &page,
        &config.list_page,
        &config.base_url,
        config.detail(),
    );
    sink.emit(&CrawlEvent::ItemsExtracted {
        round: unit.page,
        count: records.len(),
    });
    if unit.cap > 0 {
        records.truncate(unit.cap);
    }

    if let Some(detail) = config.detail() {
        DetailResolver::new(detail, config.delay_duration(), sink)
            .resolve(fetcher, &mut records)
            .await;
    }
    Ok(records)
}
