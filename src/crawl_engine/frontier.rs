//! Crawl frontier: pending work queue plus visited-set deduplication.
//!
//! Entries are `(url, depth)` pairs dequeued in FIFO order. Because links
//! discovered at depth d are only ever enqueued at depth d+1, FIFO order is
//! breadth-first: all depth-d entries are handed out before any depth-(d+1)
//! entry. Completion order among same-depth entries under concurrent workers
//! is unspecified.
//!
//! Deduplication key is the normalized URL: parsed with `url::Url` (which
//! lowercases scheme and host and gives the root path a trailing slash),
//! fragment stripped, query preserved byte-for-byte.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashSet;
use log::warn;
use tokio::sync::Mutex;
use url::Url;

use super::session::CrawlStats;

/// One unit of pending crawl work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
}

/// Normalize a raw URL for deduplication.
///
/// Prepends `default_scheme` when the input has no scheme, strips the
/// fragment, and rejects anything that is not http(s).
pub(crate) fn normalize_url(raw: &str, default_scheme: &str) -> Option<String> {
    let candidate = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("{default_scheme}://{raw}")
    };
    let mut parsed = Url::parse(&candidate).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.set_fragment(None);
    Some(parsed.into())
}

/// Pending-work queue with visited-set dedup and depth/domain scoping.
///
/// Created per crawl session and discarded at session end. The queue is
/// guarded by its own mutex and the visited set is lock-free; neither is
/// ever held while acquiring another resource.
pub struct Frontier {
    queue: Mutex<VecDeque<FrontierEntry>>,
    visited: DashSet<String>,
    base_domain: String,
    max_depth: u32,
    stats: Arc<CrawlStats>,
}

impl Frontier {
    #[must_use]
    pub fn new(base_domain: impl Into<String>, max_depth: u32, stats: Arc<CrawlStats>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            visited: DashSet::new(),
            base_domain: base_domain.into().to_lowercase(),
            max_depth,
            stats,
        }
    }

    /// Enqueue a URL if it normalizes, has not been seen, and is within the
    /// depth bound. Returns true when the URL was actually enqueued, in which
    /// case the discovered counter has been incremented.
    pub async fn add_url(&self, raw: &str, depth: u32) -> bool {
        let Some(url) = normalize_url(raw, "https") else {
            return false;
        };
        if depth > self.max_depth {
            return false;
        }
        // DashSet::insert is the single dedup point: only one caller can win
        // for a given normalized URL, even with concurrent adders.
        if !self.visited.insert(url.clone()) {
            return false;
        }
        self.queue.lock().await.push_back(FrontierEntry { url, depth });
        self.stats.record_discovered();
        true
    }

    /// Dequeue the next entry. Each URL is handed out exactly once.
    pub async fn next(&self) -> Option<FrontierEntry> {
        self.queue.lock().await.pop_front()
    }

    /// Parse outbound links from fetched HTML and enqueue the in-scope ones
    /// at `current_depth + 1`. Never called in list mode; list URLs form a
    /// closed set with no expansion.
    ///
    /// Returns the number of newly enqueued URLs.
    pub async fn extract_links(&self, html: &str, page_url: &str, current_depth: u32) -> usize {
        if current_depth >= self.max_depth {
            return 0;
        }
        let Ok(base) = Url::parse(page_url) else {
            warn!("skipping link extraction for unparseable page url: {page_url}");
            return 0;
        };

        let mut added = 0;
        for link in collect_links(html, &base) {
            if !matches!(link.scheme(), "http" | "https") {
                continue;
            }
            if !self.in_scope(&link) {
                continue;
            }
            if self.add_url(link.as_str(), current_depth + 1).await {
                added += 1;
            }
        }
        added
    }

    /// Whether a URL belongs to the crawl's base domain.
    pub(crate) fn in_scope(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.base_domain))
    }

    #[must_use]
    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// Discovered count from the session stats (used to cap seeding).
    pub(crate) fn stats_discovered(&self) -> usize {
        self.stats.discovered()
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }
}

/// Pull anchor hrefs out of an HTML document, resolved against the page URL.
///
/// Plain function rather than a method: `scraper::Html` is not `Send`, so the
/// document must be parsed and dropped before any await point.
fn collect_links(html: &str, base: &Url) -> Vec<Url> {
    let document = scraper::Html::parse_document(html);
    let Ok(selector) = scraper::Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frontier(max_depth: u32) -> (Frontier, Arc<CrawlStats>) {
        let stats = Arc::new(CrawlStats::default());
        (
            Frontier::new("example.com", max_depth, Arc::clone(&stats)),
            stats,
        )
    }

    #[tokio::test]
    async fn duplicate_add_counts_discovered_once() {
        let (frontier, stats) = frontier(3);
        assert!(frontier.add_url("https://example.com/page", 0).await);
        assert!(!frontier.add_url("https://example.com/page", 0).await);
        // Same page with a fragment normalizes to the same key.
        assert!(!frontier.add_url("https://example.com/page#section", 0).await);
        assert_eq!(stats.snapshot().discovered, 1);
        assert_eq!(frontier.len().await, 1);
    }

    #[tokio::test]
    async fn depth_beyond_max_is_rejected() {
        let (frontier, stats) = frontier(2);
        assert!(!frontier.add_url("https://example.com/deep", 3).await);
        assert_eq!(stats.snapshot().discovered, 0);
    }

    #[tokio::test]
    async fn root_url_with_and_without_slash_dedup() {
        let (frontier, _) = frontier(3);
        assert!(frontier.add_url("https://example.com", 0).await);
        assert!(!frontier.add_url("https://example.com/", 0).await);
    }

    #[tokio::test]
    async fn schemeless_url_defaults_to_https() {
        let (frontier, _) = frontier(3);
        assert!(frontier.add_url("example.com/page", 0).await);
        let entry = frontier.next().await.unwrap();
        assert_eq!(entry.url, "https://example.com/page");
    }

    #[tokio::test]
    async fn dequeue_is_fifo() {
        let (frontier, _) = frontier(3);
        frontier.add_url("https://example.com/a", 0).await;
        frontier.add_url("https://example.com/b", 0).await;
        frontier.add_url("https://example.com/c", 1).await;
        assert_eq!(frontier.next().await.unwrap().url, "https://example.com/a");
        assert_eq!(frontier.next().await.unwrap().url, "https://example.com/b");
        assert_eq!(frontier.next().await.unwrap().depth, 1);
        assert!(frontier.next().await.is_none());
    }

    #[tokio::test]
    async fn extract_links_keeps_same_domain_only() {
        let (frontier, stats) = frontier(3);
        let html = r#"
            <html><body>
                <a href="/relative">rel</a>
                <a href="https://example.com/absolute">abs</a>
                <a href="https://other.org/external">ext</a>
                <a href="mailto:someone@example.com">mail</a>
            </body></html>
        "#;
        let added = frontier
            .extract_links(html, "https://example.com/", 0)
            .await;
        assert_eq!(added, 2);
        assert_eq!(stats.snapshot().discovered, 2);
        let entry = frontier.next().await.unwrap();
        assert_eq!(entry.url, "https://example.com/relative");
        assert_eq!(entry.depth, 1);
    }

    #[tokio::test]
    async fn extract_links_at_max_depth_adds_nothing() {
        let (frontier, _) = frontier(1);
        let html = r#"<a href="https://example.com/next">next</a>"#;
        let added = frontier
            .extract_links(html, "https://example.com/", 1)
            .await;
        assert_eq!(added, 0);
        assert!(frontier.is_empty().await);
    }
}
