//! Detail page enrichment.

use std::time::Duration;

use tracing::debug;

use crate::config::DetailPageConfig;
use crate::events::{CrawlEvent, EventSink};
use crate::extract::extract_detail;
use crate::fetch::PageFetcher;
use crate::models::Record;

/// Fetches each record's detail page and merges its fields in.
pub struct DetailResolver<'a> {
    config: &'a DetailPageConfig,
    delay: Duration,
    sink: &'a dyn EventSink,
}

impl<'a> DetailResolver<'a> {
    pub fn new(config: &'a DetailPageConfig, delay: Duration, sink: &'a dyn EventSink) -> Self {
        Self {
            config,
            delay,
            sink,
        }
    }

    /// Resolve every record carrying a pending detail URL.
    ///
    /// Records without one pass through untouched. A failed detail fetch
    /// leaves that record with its list fields and moves on.
    pub async fn resolve(&self, fetcher: &mut dyn PageFetcher, records: &mut [Record]) {
        let mut fetched = 0usize;
        for record in records.iter_mut() {
            let Some(url) = record.detail_url.take() else {
                continue;
            };

            if fetched > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            fetched += 1;

            debug!("Fetching detail page {}", url);
            match fetcher.fetch(&url).await {
                Ok(page) => record.merge(extract_detail(&page, &self.config.fields)),
                Err(e) => self.sink.emit(&CrawlEvent::DetailFailed {
                    url,
                    error: e.to_string(),
                }),
            }
        }
    }
}
