use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::{Batch, PaginationStrategy};
use crate::config::{SpiderConfig, SpiderMode};
use crate::events::StopReason;
use crate::extract::has_next_page;
use crate::extract::json::value_to_string;
use crate::fetch::Page;
use crate::spider::pipeline::{CrawlContext, RoundSummary};

const DEFAULT_SIZE_PARAM: &str = "size";
const DEFAULT_PAGE_SIZE: u32 = 20;

/// URL of list page `page` (1-based).
///
/// In api mode the configured `params` are sent on every request, and with a
/// `pagination` section the page number and page size are always added. In
/// browser mode the page parameter is only appended from page 2 on, so page
/// 1 is exactly `base_url`.
pub fn page_url(config: &SpiderConfig, page: u32) -> String {
    let Ok(mut url) = Url::parse(&config.base_url) else {
        return config.base_url.clone();
    };
    let pagination = config.pagination.as_ref();
    let param = pagination.map(|p| p.param.as_str()).unwrap_or("page");

    let mut query: BTreeMap<String, String> = BTreeMap::new();
    match config.spider_mode() {
        Ok(SpiderMode::Api) => {
            for (key, value) in &config.params {
                query.insert(key.clone(), value_to_string(value));
            }
            if let Some(p) = pagination {
                query.insert(param.to_string(), page.to_string());
                let size_param = p.size_param.as_deref().unwrap_or(DEFAULT_SIZE_PARAM);
                if !size_param.is_empty() {
                    query.insert(
                        size_param.to_string(),
                        p.size.unwrap_or(DEFAULT_PAGE_SIZE).to_string(),
                    );
                }
            }
        }
        _ => {
            if page > 1 {
                query.insert(param.to_string(), page.to_string());
            }
        }
    }

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    url.to_string()
}

/// Fetch page 1, 2, 3... until the site runs out or `max_pages` is hit.
pub struct UrlStrategy {
    config: SpiderConfig,
}

impl UrlStrategy {
    pub fn new(config: &SpiderConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl PaginationStrategy for UrlStrategy {
    async fn next_batch(&mut self, ctx: &mut CrawlContext, iteration: u32) -> Batch {
        if iteration > self.config.max_pages {
            return Batch::Done(StopReason::MaxPages);
        }
        let url = page_url(&self.config, iteration);
        match ctx.load(&url).await {
            Some(page) => Batch::Page(page),
            None => Batch::Failed,
        }
    }

    fn should_stop(
        &mut self,
        page: Option<&Page>,
        round: &RoundSummary,
        iteration: u32,
    ) -> Option<StopReason> {
        if round.extracted == 0 {
            return Some(StopReason::NoItems);
        }
        let Some(ref pagination) = self.config.pagination else {
            return Some(StopReason::NoNextPage);
        };
        if let Some(page) = page {
            if has_next_page(page, pagination) == Some(false) {
                return Some(StopReason::NoNextPage);
            }
        }
        if iteration >= self.config.max_pages {
            return Some(StopReason::MaxPages);
        }
        None
    }

    fn delay(&self) -> Duration {
        self.config.delay_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaginationConfig;
    use serde_json::json;

    fn config(mode: &str) -> SpiderConfig {
        SpiderConfig {
            name: "t".to_string(),
            mode: mode.to_string(),
            base_url: "https://example.com/list?q=rust".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_browser_page_one_is_base_url() {
        let mut config = config("browser");
        config.pagination = Some(PaginationConfig {
            param: "p".to_string(),
            ..Default::default()
        });
        assert_eq!(page_url(&config, 1), "https://example.com/list?q=rust");
        assert_eq!(page_url(&config, 3), "https://example.com/list?q=rust&p=3");
    }

    #[test]
    fn test_api_adds_params_and_paging() {
        let mut config = config("api");
        config.params.insert("limit".to_string(), json!(5));
        assert_eq!(page_url(&config, 1), "https://example.com/list?q=rust&limit=5");

        config.pagination = Some(PaginationConfig {
            size_param: Some("per_page".to_string()),
            size: Some(50),
            ..Default::default()
        });
        assert_eq!(
            page_url(&config, 2),
            "https://example.com/list?q=rust&limit=5&page=2&per_page=50"
        );
    }

    #[test]
    fn test_stop_conditions() {
        let mut config = config("browser");
        config.max_pages = 3;
        config.pagination = Some(PaginationConfig {
            next_selector: Some(".next".to_string()),
            ..Default::default()
        });
        let mut strategy = UrlStrategy::new(&config);
        let some = RoundSummary {
            extracted: 2,
            added: 2,
            capped: false,
        };

        let with_next = Page::Html(r#"<a class="next">n</a>"#.to_string());
        let without = Page::Html("<p></p>".to_string());

        assert_eq!(strategy.should_stop(Some(&with_next), &some, 1), None);
        assert_eq!(
            strategy.should_stop(Some(&without), &some, 1),
            Some(StopReason::NoNextPage)
        );
        assert_eq!(
            strategy.should_stop(Some(&with_next), &some, 3),
            Some(StopReason::MaxPages)
        );
        assert_eq!(
            strategy.should_stop(None, &RoundSummary::default(), 2),
            Some(StopReason::NoItems)
        );
    }
}
