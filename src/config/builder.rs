//! Fluent builder for `CrawlConfig`.
//!
//! All fields have sensible defaults; `build()` validates the ranges the
//! crawl engine depends on (positive URL budget, at least one worker, at
//! least one pool page).

use anyhow::{Result, anyhow};

use super::types::{BrowserEngine, CrawlConfig, JsConfig};

#[derive(Debug, Clone, Default)]
pub struct CrawlConfigBuilder {
    config: CrawlConfig,
}

impl CrawlConfig {
    /// Create a builder pre-populated with defaults.
    #[must_use]
    pub fn builder() -> CrawlConfigBuilder {
        CrawlConfigBuilder::default()
    }
}

impl CrawlConfigBuilder {
    /// Maximum link-hop depth for standard mode (0 = seed page only).
    #[must_use]
    pub fn max_depth(mut self, depth: u32) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Hard cap on pages crawled per session.
    #[must_use]
    pub fn max_urls(mut self, max: usize) -> Self {
        self.config.max_urls = max;
        self
    }

    #[must_use]
    pub fn discover_sitemaps(mut self, enabled: bool) -> Self {
        self.config.discover_sitemaps = enabled;
        self
    }

    #[must_use]
    pub fn enable_javascript(mut self, enabled: bool) -> Self {
        self.config.enable_javascript = enabled;
        self
    }

    /// Steady request cadence shared by all workers.
    #[must_use]
    pub fn requests_per_second(mut self, rps: f64) -> Self {
        self.config.requests_per_second = rps;
        self
    }

    /// Number of concurrent workers.
    #[must_use]
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.config.concurrency = workers;
        self
    }

    #[must_use]
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn js_engine(mut self, engine: BrowserEngine) -> Self {
        self.config.js.engine = engine;
        self
    }

    #[must_use]
    pub fn js_headless(mut self, headless: bool) -> Self {
        self.config.js.headless = headless;
        self
    }

    #[must_use]
    pub fn js_viewport(mut self, width: u32, height: u32) -> Self {
        self.config.js.viewport_width = width;
        self.config.js.viewport_height = height;
        self
    }

    #[must_use]
    pub fn js_navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.js.navigation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn js_settle_secs(mut self, secs: u64) -> Self {
        self.config.js.settle_secs = secs;
        self
    }

    #[must_use]
    pub fn js_pool_size(mut self, pages: usize) -> Self {
        self.config.js.pool_size = pages;
        self
    }

    #[must_use]
    pub fn js_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.js.user_agent = agent.into();
        self
    }

    /// Replace the whole JavaScript sub-config at once.
    #[must_use]
    pub fn js(mut self, js: JsConfig) -> Self {
        self.config.js = js;
        self
    }

    pub fn build(self) -> Result<CrawlConfig> {
        let config = self.config;
        if config.max_urls == 0 {
            return Err(anyhow!("max_urls must be greater than zero"));
        }
        if config.requests_per_second <= 0.0 {
            return Err(anyhow!("requests_per_second must be positive"));
        }
        if config.concurrency == 0 {
            return Err(anyhow!("concurrency must be at least 1"));
        }
        if config.js.pool_size == 0 {
            return Err(anyhow!("js pool_size must be at least 1"));
        }
        Ok(config)
    }
}
