//! Crawl engine: frontier, pacing, session state, and the orchestrator that
//! ties them together.

pub mod frontier;
pub mod orchestrator;
pub mod rate_limiter;
pub mod session;
mod sitemap;

pub use frontier::{Frontier, FrontierEntry};
pub use orchestrator::{CrawlOrchestrator, StartCrawlRequest};
pub use rate_limiter::RateLimiter;
pub use session::{CrawlMode, CrawlStats, CrawlStatus, StatsSnapshot, StatusSnapshot};
