//! smartspider - configuration-driven web data extraction.
//!
//! A JSON config describes a site's list and detail pages, how to paginate
//! and where to write results. The engine fetches pages over HTTP or through
//! a headless browser, extracts flat records, deduplicates them and stops on
//! the first exhausted bound.

pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod events;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod output;
pub mod spider;

pub use config::SpiderConfig;
pub use error::{ConfigError, FetchError, OutputError, SpiderError};
pub use events::{CrawlEvent, EventSink, StopReason};
pub use models::{Record, ResultSet};
pub use spider::{Spider, SpiderManager};
