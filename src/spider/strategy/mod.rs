//! Pagination strategies.
//!
//! Every variant shares one loop ([`drive`]): get the next batch, absorb it,
//! then ask the variant whether to stop. Variants only differ in how they
//! produce a batch and when they give up.

mod click;
mod feed;
mod paged;
mod scroll;

pub use click::ClickStrategy;
pub use feed::FeedStrategy;
pub use paged::{page_url, UrlStrategy};
pub use scroll::ScrollStrategy;

use std::time::Duration;

use async_trait::async_trait;

use super::pipeline::{CrawlContext, RoundSummary};
use crate::config::{PaginationKind, SpiderConfig};
use crate::events::StopReason;
use crate::fetch::Page;

/// What a strategy produced for one iteration.
#[derive(Debug)]
pub enum Batch {
    /// Content to run through the pipeline.
    Page(Page),
    /// Fetching failed; counts as a round with no items.
    Failed,
    /// Nothing more to fetch.
    Done(StopReason),
}

#[async_trait]
pub trait PaginationStrategy: Send {
    /// Produce the content for `iteration` (1-based).
    async fn next_batch(&mut self, ctx: &mut CrawlContext, iteration: u32) -> Batch;

    /// Decide, after a round was absorbed, whether the crawl is over.
    /// `page` is None when the round's fetch failed.
    fn should_stop(
        &mut self,
        page: Option<&Page>,
        round: &RoundSummary,
        iteration: u32,
    ) -> Option<StopReason>;

    /// Pause before the next iteration.
    fn delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// Build the strategy for a pagination kind.
pub fn for_kind(kind: PaginationKind, config: &SpiderConfig) -> Box<dyn PaginationStrategy> {
    match kind {
        PaginationKind::Url => Box::new(UrlStrategy::new(config)),
        PaginationKind::Scroll => Box::new(ScrollStrategy::new(config)),
        PaginationKind::Click => Box::new(ClickStrategy::new(config)),
        PaginationKind::Feed => Box::new(FeedStrategy::new(config)),
    }
}

/// Run a strategy to completion and return why it stopped.
pub async fn drive(strategy: &mut dyn PaginationStrategy, ctx: &mut CrawlContext) -> StopReason {
    let mut iteration = 1;
    loop {
        let (page, round) = match strategy.next_batch(ctx, iteration).await {
            Batch::Done(reason) => return reason,
            Batch::Failed if iteration == 1 => return StopReason::FirstFetchFailed,
            Batch::Failed => (None, RoundSummary::default()),
            Batch::Page(page) => {
                let round = ctx.absorb(&page).await;
                (Some(page), round)
            }
        };

        if round.capped {
            return StopReason::CapReached;
        }
        if let Some(reason) = strategy.should_stop(page.as_ref(), &round, iteration) {
            return reason;
        }

        iteration += 1;
        let delay = strategy.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
