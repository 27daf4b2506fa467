use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Batch, PaginationStrategy};
use crate::config::{secs, SpiderConfig};
use crate::events::StopReason;
use crate::fetch::Page;
use crate::spider::pipeline::{CrawlContext, RoundSummary};

/// Click a "load more" control until it disappears or the click budget is spent.
pub struct ClickStrategy {
    base_url: String,
    selector: Option<String>,
    max_clicks: u32,
    wait: Duration,
}

impl ClickStrategy {
    pub fn new(config: &SpiderConfig) -> Self {
        let pagination = config.pagination.clone().unwrap_or_default();
        Self {
            base_url: config.base_url.clone(),
            selector: pagination.load_more_selector.filter(|s| !s.is_empty()),
            max_clicks: pagination.max_clicks,
            wait: secs(pagination.click_wait),
        }
    }
}

#[async_trait]
impl PaginationStrategy for ClickStrategy {
    async fn next_batch(&mut self, ctx: &mut CrawlContext, iteration: u32) -> Batch {
        if iteration == 1 {
            return match ctx.load(&self.base_url).await {
                Some(page) => Batch::Page(page),
                None => Batch::Failed,
            };
        }

        if iteration - 1 > self.max_clicks {
            return Batch::Done(StopReason::MaxClicks);
        }
        let Some(ref selector) = self.selector else {
            return Batch::Done(StopReason::ControlMissing);
        };

        match ctx.fetcher().click(selector).await {
            Ok(true) => {}
            Ok(false) => return Batch::Done(StopReason::ControlMissing),
            Err(e) => {
                debug!("Load-more click failed: {}", e);
                return Batch::Done(StopReason::ControlMissing);
            }
        }
        tokio::time::sleep(self.wait).await;

        match ctx.read().await {
            Some(page) => Batch::Page(page),
            None => Batch::Failed,
        }
    }

    fn should_stop(
        &mut self,
        _page: Option<&Page>,
        _round: &RoundSummary,
        _iteration: u32,
    ) -> Option<StopReason> {
        None
    }
}
