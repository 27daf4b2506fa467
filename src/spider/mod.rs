//! Crawl orchestration.
//!
//! [`Spider`] validates a config, picks the execution plan, provisions
//! fetchers and drives the crawl to a [`ResultSet`].

pub mod concurrent;
pub mod detail;
pub mod manager;
pub mod pipeline;
pub mod strategy;

pub use concurrent::ConcurrentCoordinator;
pub use detail::DetailResolver;
pub use manager::{RunReport, RunStatus, SpiderManager};
pub use pipeline::{CrawlContext, RoundSummary};

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{PaginationKind, SpiderConfig};
use crate::error::SpiderError;
use crate::events::{CrawlEvent, EventSink, TracingSink};
use crate::fetch::{ConfigFetcherFactory, FetcherFactory};
use crate::models::ResultSet;

/// How a crawl will be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPlan {
    /// One fetcher driven by a pagination strategy.
    Sequential(PaginationKind),
    /// URL pages fetched in parallel.
    Concurrent { workers: usize },
}

pub struct Spider {
    config: Arc<SpiderConfig>,
    factory: Arc<dyn FetcherFactory>,
    sink: Arc<dyn EventSink>,
    plan: ExecutionPlan,
}

impl Spider {
    /// Validate `config` and prepare a spider using the config's own fetch backend.
    pub fn new(config: SpiderConfig) -> Result<Self, SpiderError> {
        config.validate()?;
        let kind = config.pagination_kind()?;

        let plan = match kind {
            PaginationKind::Url if config.worker_count() > 1 => ExecutionPlan::Concurrent {
                workers: config.worker_count(),
            },
            kind => {
                if config.concurrent > 1 {
                    warn!(
                        "{:?} pagination runs sequentially, ignoring concurrent={}",
                        kind, config.concurrent
                    );
                }
                ExecutionPlan::Sequential(kind)
            }
        };

        let config = Arc::new(config);
        Ok(Self {
            factory: Arc::new(ConfigFetcherFactory::new(config.clone())),
            sink: Arc::new(TracingSink),
            config,
            plan,
        })
    }

    /// Use a different fetch backend.
    pub fn with_factory(mut self, factory: Arc<dyn FetcherFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Send crawl events somewhere other than the log.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &SpiderConfig {
        &self.config
    }

    pub fn plan(&self) -> ExecutionPlan {
        self.plan
    }

    /// Run the crawl. Every fetcher provisioned along the way is closed before returning.
    pub async fn crawl(&self) -> Result<ResultSet, SpiderError> {
        info!("Starting spider: {} ({:?})", self.config.name, self.plan);

        let results = match self.plan {
            ExecutionPlan::Concurrent { .. } => {
                ConcurrentCoordinator::new(
                    self.config.clone(),
                    self.factory.clone(),
                    self.sink.clone(),
                )
                .run()
                .await
            }
            ExecutionPlan::Sequential(kind) => {
                let fetcher = self
                    .factory
                    .create()
                    .await
                    .map_err(SpiderError::Provision)?;
                let mut ctx = CrawlContext::new(
                    self.config.clone(),
                    fetcher,
                    self.factory.clone(),
                    self.sink.clone(),
                );
                let mut strategy = strategy::for_kind(kind, &self.config);
                let reason = strategy::drive(strategy.as_mut(), &mut ctx).await;
                let results = ctx.finish().await;
                self.sink.emit(&CrawlEvent::Stopped {
                    reason,
                    total: results.len(),
                });
                results
            }
        };

        info!(
            "Spider {} finished with {} records",
            self.config.name,
            results.len()
        );
        Ok(results)
    }
}
