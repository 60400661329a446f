//! LibreCrawl: a configurable concurrent web crawler with optional
//! JavaScript rendering.
//!
//! The crate is organized around a handful of collaborators:
//!
//! - [`config`] — typed, validated crawl configuration with a builder
//! - [`crawl_engine`] — frontier, global rate limiter, and the orchestrator
//!   driving the concurrent worker loop
//! - [`page_pool`] — fixed-size pool of headless-browser pages for
//!   JavaScript rendering
//! - [`fetch`] — plain-HTTP fetching behind a swappable trait
//!
//! A typical embedding creates one [`CrawlOrchestrator`] for the life of the
//! process and drives it through `start_crawl` / `get_status` / `stop_crawl`:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use librecrawl::{CrawlConfig, CrawlOrchestrator, HttpFetcher, StartCrawlRequest};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = CrawlConfig::builder()
//!     .max_depth(2)
//!     .max_urls(200)
//!     .requests_per_second(2.0)
//!     .build()?;
//!
//! let fetcher = Arc::new(HttpFetcher::new("LibreCrawl/1.0")?);
//! let orchestrator = Arc::new(CrawlOrchestrator::new(fetcher, 2.0));
//!
//! orchestrator
//!     .start_crawl(
//!         StartCrawlRequest {
//!             url: Some("https://example.com".to_string()),
//!             url_list: None,
//!         },
//!         config,
//!     )
//!     .await?;
//! orchestrator.wait_for_completion().await;
//! println!("{:?}", orchestrator.get_status());
//! # Ok(())
//! # }
//! ```

pub mod browser_setup;
pub mod config;
pub mod crawl_engine;
pub mod error;
pub mod fetch;
pub mod page_pool;

pub use config::{BrowserEngine, CrawlConfig, CrawlConfigBuilder, JsConfig};
pub use crawl_engine::{
    CrawlMode, CrawlOrchestrator, CrawlStats, CrawlStatus, Frontier, FrontierEntry, RateLimiter,
    StartCrawlRequest, StatsSnapshot, StatusSnapshot,
};
pub use error::{CrawlError, FetchError, PoolError};
pub use fetch::{FetchClient, FetchResponse, HttpFetcher};
pub use page_pool::{PagePool, RenderedPage};
