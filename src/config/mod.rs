//! Crawl configuration.

mod builder;
mod types;

pub use builder::CrawlConfigBuilder;
pub use types::{
    BrowserEngine, CrawlConfig, DEFAULT_CRAWL_RATE_RPS, DEFAULT_MAX_DEPTH, DEFAULT_MAX_URLS,
    JsConfig,
};
