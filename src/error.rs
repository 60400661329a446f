//! Error taxonomy for the crawl engine, fetch layer, and page pool.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the crawl orchestrator's control operations.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The start request named no crawlable input or an unusable URL.
    #[error("invalid crawl input: {0}")]
    Input(String),

    /// A session is already running or still stopping.
    #[error("a crawl is already in progress")]
    AlreadyRunning,

    /// The session could not be brought up (browser launch, page pool).
    #[error("crawl initialization failed: {0}")]
    Initialization(String),
}

/// Errors from plain-HTTP fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors from the browser page pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has no live browser behind it.
    #[error("page pool is not initialized")]
    NotInitialized,

    #[error("page pool initialization failed: {0}")]
    Initialization(String),

    /// No page became available within the wait bound.
    #[error("timed out after {0:?} waiting for a free page")]
    Timeout(Duration),

    /// The page did not reach DOM-ready within the navigation timeout.
    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("navigation failed: {0}")]
    Navigation(String),

    /// CDP-level failure talking to the browser.
    #[error("browser error: {0}")]
    Browser(String),
}
