use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Batch, PaginationStrategy};
use crate::config::{secs, PaginationKind, SpiderConfig};
use crate::events::StopReason;
use crate::fetch::Page;
use crate::spider::pipeline::{CrawlContext, RoundSummary};

/// Infinite scroll: keep scrolling while the page grows and yields new items.
pub struct ScrollStrategy {
    base_url: String,
    max_scrolls: u32,
    pause: Duration,
    last_height: u64,
    /// Whether the latest scroll made the page taller.
    grew: bool,
}

impl ScrollStrategy {
    pub fn new(config: &SpiderConfig) -> Self {
        let pagination = config.pagination.clone().unwrap_or_default();
        let (max_scrolls, pause) = match config.custom_pagination {
            Some(ref custom)
                if PaginationKind::parse(&custom.pagination_type).ok()
                    == Some(PaginationKind::Scroll) =>
            {
                (custom.max_scroll_attempts, secs(custom.scroll_pause_time))
            }
            _ => (pagination.max_scroll_attempts, secs(pagination.scroll_pause)),
        };
        Self {
            base_url: config.base_url.clone(),
            max_scrolls,
            pause,
            last_height: 0,
            grew: true,
        }
    }
}

#[async_trait]
impl PaginationStrategy for ScrollStrategy {
    async fn next_batch(&mut self, ctx: &mut CrawlContext, iteration: u32) -> Batch {
        if iteration == 1 {
            let Some(page) = ctx.load(&self.base_url).await else {
                return Batch::Failed;
            };
            self.last_height = ctx.fetcher().page_height().await.unwrap_or(0);
            return Batch::Page(page);
        }

        let scroll = iteration - 1;
        if scroll > self.max_scrolls {
            return Batch::Done(StopReason::MaxScrolls);
        }

        if let Err(e) = ctx.fetcher().scroll_to_bottom().await {
            ctx.report_failure(&e);
            return Batch::Failed;
        }
        tokio::time::sleep(self.pause).await;

        let height = match ctx.fetcher().page_height().await {
            Ok(h) => h,
            Err(e) => {
                ctx.report_failure(&e);
                return Batch::Failed;
            }
        };
        debug!("Scroll {}: height {} -> {}", scroll, self.last_height, height);
        self.grew = height > self.last_height;
        self.last_height = self.last_height.max(height);

        match ctx.read().await {
            Some(page) => Batch::Page(page),
            None => Batch::Failed,
        }
    }

    fn should_stop(
        &mut self,
        _page: Option<&Page>,
        round: &RoundSummary,
        _iteration: u32,
    ) -> Option<StopReason> {
        if !self.grew {
            return Some(StopReason::HeightUnchanged);
        }
        (round.added == 0).then_some(StopReason::NoNewItems)
    }
}
