//! Sitemap discovery for standard-mode seeding.
//!
//! Looks for `Sitemap:` directives in robots.txt and falls back to the
//! conventional `/sitemap.xml` location, then seeds the frontier with every
//! same-domain `<loc>` entry at depth 0. All failures here are logged and
//! non-fatal; a missing sitemap simply leaves the seed URL as the only entry.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use regex::Regex;
use url::Url;

use super::frontier::Frontier;
use crate::fetch::FetchClient;

/// Fetch robots.txt and candidate sitemaps, enqueueing discovered URLs until
/// `max_urls` discoveries have accumulated. Returns the number of URLs added.
pub(crate) async fn discover_and_add_sitemap_urls(
    fetcher: &Arc<dyn FetchClient>,
    base_url: &str,
    frontier: &Frontier,
    timeout: Duration,
    max_urls: usize,
) -> usize {
    let mut candidates = Vec::new();

    match fetcher
        .fetch(format!("{base_url}/robots.txt"), timeout)
        .await
    {
        Ok(response) if response.status < 400 => {
            for line in response.body.lines() {
                let line = line.trim();
                if let Some((directive, value)) = line.split_once(':')
                    && directive.eq_ignore_ascii_case("sitemap")
                {
                    candidates.push(value.trim().to_string());
                }
            }
        }
        Ok(response) => {
            debug!("robots.txt returned status {}", response.status);
        }
        Err(e) => {
            debug!("robots.txt fetch failed: {e}");
        }
    }

    let default_sitemap = format!("{base_url}/sitemap.xml");
    if !candidates.contains(&default_sitemap) {
        candidates.push(default_sitemap);
    }

    let Ok(loc_pattern) = Regex::new(r"<loc>\s*([^<]+?)\s*</loc>") else {
        return 0;
    };

    let mut added = 0;
    for sitemap_url in candidates {
        if frontier.stats_discovered() >= max_urls {
            break;
        }
        let body = match fetcher.fetch(sitemap_url.clone(), timeout).await {
            Ok(response) if response.status < 400 => response.body,
            Ok(response) => {
                debug!("sitemap {sitemap_url} returned status {}", response.status);
                continue;
            }
            Err(e) => {
                warn!("sitemap fetch failed for {sitemap_url}: {e}");
                continue;
            }
        };

        for capture in loc_pattern.captures_iter(&body) {
            if frontier.stats_discovered() >= max_urls {
                break;
            }
            let loc = capture[1].trim();
            let Ok(parsed) = Url::parse(loc) else {
                continue;
            };
            if !frontier.in_scope(&parsed) {
                continue;
            }
            if frontier.add_url(loc, 0).await {
                added += 1;
            }
        }
    }

    info!("sitemap discovery added {added} urls for {base_url}");
    added
}
