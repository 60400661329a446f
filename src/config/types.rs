//! Core configuration types for crawl runs.
//!
//! `CrawlConfig` replaces the loosely-typed string-keyed settings map the
//! crawler historically used with named, typed, defaulted fields. A config is
//! immutable for the duration of one crawl session.

use serde::{Deserialize, Serialize};

/// Default steady request rate shared by all workers.
pub const DEFAULT_CRAWL_RATE_RPS: f64 = 2.0;

/// Default link-hop depth bound for standard mode.
pub const DEFAULT_MAX_DEPTH: u32 = 3;

/// Default hard cap on pages crawled per session.
pub const DEFAULT_MAX_URLS: usize = 1000;

/// Browser engine requested for JavaScript rendering.
///
/// Only Chromium can be driven over CDP; the other variants are accepted for
/// configuration compatibility and fall back to Chromium with a warning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

/// JavaScript rendering sub-settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsConfig {
    pub engine: BrowserEngine,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Timeout for page navigation (DOM-ready criterion).
    pub navigation_timeout_secs: u64,
    /// Extra wait after load for deferred script execution.
    pub settle_secs: u64,
    /// Number of reusable browser pages in the pool.
    pub pool_size: usize,
    pub user_agent: String,
}

impl Default for JsConfig {
    fn default() -> Self {
        Self {
            engine: BrowserEngine::Chromium,
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            navigation_timeout_secs: 30,
            settle_secs: 2,
            pool_size: 3,
            user_agent: "LibreCrawl/1.0 (Web Crawler with JavaScript)".to_string(),
        }
    }
}

/// Immutable per-run crawl configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub(crate) max_depth: u32,
    pub(crate) max_urls: usize,
    pub(crate) discover_sitemaps: bool,
    pub(crate) enable_javascript: bool,
    pub(crate) requests_per_second: f64,
    /// Number of concurrent workers pulling from the frontier.
    pub(crate) concurrency: usize,
    /// Timeout for plain-HTTP fetches.
    pub(crate) fetch_timeout_secs: u64,
    pub(crate) js: JsConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_urls: DEFAULT_MAX_URLS,
            discover_sitemaps: true,
            enable_javascript: false,
            requests_per_second: DEFAULT_CRAWL_RATE_RPS,
            concurrency: 5,
            fetch_timeout_secs: 30,
            js: JsConfig::default(),
        }
    }
}

impl CrawlConfig {
    #[must_use]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    #[must_use]
    pub fn max_urls(&self) -> usize {
        self.max_urls
    }

    #[must_use]
    pub fn discover_sitemaps(&self) -> bool {
        self.discover_sitemaps
    }

    #[must_use]
    pub fn enable_javascript(&self) -> bool {
        self.enable_javascript
    }

    #[must_use]
    pub fn requests_per_second(&self) -> f64 {
        self.requests_per_second
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub fn fetch_timeout_secs(&self) -> u64 {
        self.fetch_timeout_secs
    }

    #[must_use]
    pub fn js(&self) -> &JsConfig {
        &self.js
    }
}
