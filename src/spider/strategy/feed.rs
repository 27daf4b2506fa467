use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Batch, PaginationStrategy};
use crate::config::{secs, CustomPaginationConfig, SpiderConfig};
use crate::events::StopReason;
use crate::fetch::Page;
use crate::spider::pipeline::{CrawlContext, RoundSummary};

/// Endless feeds that lazy-load on a small upward nudge followed by a scroll
/// to the bottom. Gives up after `max_idle_rounds` rounds in a row add nothing.
pub struct FeedStrategy {
    base_url: String,
    settings: CustomPaginationConfig,
    pause: Duration,
    idle_rounds: u32,
}

impl FeedStrategy {
    pub fn new(config: &SpiderConfig) -> Self {
        let settings = config
            .custom_pagination
            .clone()
            .unwrap_or_else(|| CustomPaginationConfig::new("feed"));
        Self {
            base_url: config.base_url.clone(),
            pause: secs(settings.scroll_pause_time),
            settings,
            idle_rounds: 0,
        }
    }
}

#[async_trait]
impl PaginationStrategy for FeedStrategy {
    async fn next_batch(&mut self, ctx: &mut CrawlContext, iteration: u32) -> Batch {
        if iteration == 1 {
            return match ctx.load(&self.base_url).await {
                Some(page) => Batch::Page(page),
                None => Batch::Failed,
            };
        }

        if iteration - 1 > self.settings.max_scroll_attempts {
            return Batch::Done(StopReason::MaxScrolls);
        }

        if self.settings.scroll_back_px > 0 {
            if let Err(e) = ctx.fetcher().scroll_by(-self.settings.scroll_back_px).await {
                ctx.report_failure(&e);
                return Batch::Failed;
            }
        }
        if let Err(e) = ctx.fetcher().scroll_to_bottom().await {
            ctx.report_failure(&e);
            return Batch::Failed;
        }
        tokio::time::sleep(self.pause).await;

        // Still spinning: give the feed one more pause.
        if let Some(ref loading) = self.settings.loading_selector {
            if let Ok(true) = ctx.fetcher().wait_for(loading, Duration::ZERO).await {
                debug!("Feed still loading, waiting another {:?}", self.pause);
                tokio::time::sleep(self.pause).await;
            }
        }

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
        if round.added > 0 {
            self.idle_rounds = 0;
            return None;
        }
        self.idle_rounds += 1;
        debug!(
            "No new items ({}/{})",
            self.idle_rounds, self.settings.max_idle_rounds
        );
        (self.idle_rounds >= self.settings.max_idle_rounds.max(1)).then_some(StopReason::IdleRounds)
    }
}
