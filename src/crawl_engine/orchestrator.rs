//! Crawl orchestrator: session lifecycle and the concurrent worker loop.
//!
//! One orchestrator lives for the life of the process and runs at most one
//! crawl session at a time. Long-lived collaborators (rate limiter, page
//! pool, HTTP client) persist across sessions; per-session state (frontier,
//! stats, stop flag) is created fresh by `start_crawl` and discarded when the
//! session ends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use serde::Deserialize;
use tokio::task::JoinHandle;
use url::Url;

use super::frontier::{Frontier, normalize_url};
use super::rate_limiter::RateLimiter;
use super::session::{CrawlMode, CrawlStats, CrawlStatus, StatusCell, StatusSnapshot};
use super::sitemap::discover_and_add_sitemap_urls;
use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::fetch::FetchClient;
use crate::page_pool::PagePool;

/// Idle-poll interval for workers that find the frontier empty while peers
/// are still in flight.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Start request as it arrives from the API layer.
///
/// `urlList` takes precedence over `url` when both are present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartCrawlRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "urlList", default)]
    pub url_list: Option<Vec<String>>,
}

/// Per-session state shared between the control surface and the workers.
struct RunShared {
    mode: CrawlMode,
    base_url: String,
    base_domain: String,
    stats: Arc<CrawlStats>,
    stop: Arc<AtomicBool>,
}

/// Everything a worker task needs, cloned behind one `Arc`.
struct WorkerContext {
    frontier: Arc<Frontier>,
    stats: Arc<CrawlStats>,
    stop: Arc<AtomicBool>,
    /// Attempt slots claimed so far; gives an exact `max_urls` cutoff.
    attempted: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    rate_limiter: Arc<RateLimiter>,
    fetcher: Arc<dyn FetchClient>,
    pool: Option<Arc<PagePool>>,
    mode: CrawlMode,
    max_urls: usize,
    fetch_timeout: Duration,
}

/// Decrements the in-flight count when the worker finishes processing one
/// URL, on every exit path.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

struct PageResult {
    status: u16,
    html: String,
}

/// Long-lived crawl controller.
pub struct CrawlOrchestrator {
    status: StatusCell,
    run: parking_lot::RwLock<Option<RunShared>>,
    rate_limiter: Arc<RateLimiter>,
    fetcher: Arc<dyn FetchClient>,
    pool: tokio::sync::Mutex<Option<Arc<PagePool>>>,
    supervisor: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CrawlOrchestrator {
    #[must_use]
    pub fn new(fetcher: Arc<dyn FetchClient>, requests_per_second: f64) -> Self {
        Self {
            status: StatusCell::new(CrawlStatus::Idle),
            run: parking_lot::RwLock::new(None),
            rate_limiter: Arc::new(RateLimiter::new(requests_per_second)),
            fetcher,
            pool: tokio::sync::Mutex::new(None),
            supervisor: tokio::sync::Mutex::new(None),
        }
    }

    /// Start a crawl session. Returns a human-readable confirmation, or an
    /// error when a session is already active or the request names no usable
    /// input.
    pub async fn start_crawl(
        self: &Arc<Self>,
        request: StartCrawlRequest,
        config: CrawlConfig,
    ) -> Result<String, CrawlError> {
        let plan = resolve_session(&request, &config)?;

        // Claim the session before any await: two racing starts must never
        // both pass an unsynchronized status check and set up twice.
        if !self.status.try_begin() {
            return Err(CrawlError::AlreadyRunning);
        }

        // The previous supervisor is finished once status is terminal; drop
        // its handle so the new one can be stored.
        if let Some(handle) = self.supervisor.lock().await.take() {
            handle.abort();
        }

        self.rate_limiter.update_rate(config.requests_per_second());

        let pool = if config.enable_javascript() {
            match self.ensure_pool(&config).await {
                Ok(pool) => Some(pool),
                Err(e) => {
                    self.status.store(CrawlStatus::Failed);
                    return Err(CrawlError::Initialization(e.to_string()));
                }
            }
        } else {
            None
        };

        let stats = Arc::new(CrawlStats::default());
        let stop = Arc::new(AtomicBool::new(false));
        let frontier = Arc::new(Frontier::new(
            plan.base_domain.clone(),
            plan.max_depth,
            Arc::clone(&stats),
        ));
        for seed in &plan.seeds {
            frontier.add_url(seed, 0).await;
        }

        *self.run.write() = Some(RunShared {
            mode: plan.mode,
            base_url: plan.base_url.clone(),
            base_domain: plan.base_domain.clone(),
            stats: Arc::clone(&stats),
            stop: Arc::clone(&stop),
        });

        info!(
            "starting {:?} crawl of {} ({} seeds, depth {}, max {} urls)",
            plan.mode,
            plan.base_url,
            plan.seeds.len(),
            plan.max_depth,
            config.max_urls()
        );

        let context = Arc::new(WorkerContext {
            frontier,
            stats,
            stop,
            attempted: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            rate_limiter: Arc::clone(&self.rate_limiter),
            fetcher: Arc::clone(&self.fetcher),
            pool,
            mode: plan.mode,
            max_urls: config.max_urls(),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs()),
        });

        let orchestrator = Arc::clone(self);
        let handle = tokio::spawn(async move {
            orchestrator.supervise(context, config, plan).await;
        });
        *self.supervisor.lock().await = Some(handle);

        Ok("crawl started".to_string())
    }

    /// Runs sitemap discovery, fans out the workers, and settles the final
    /// status once every worker has drained.
    async fn supervise(&self, context: Arc<WorkerContext>, config: CrawlConfig, plan: SessionPlan) {
        if plan.mode == CrawlMode::Standard && config.discover_sitemaps() {
            discover_and_add_sitemap_urls(
                &context.fetcher,
                &plan.base_url,
                &context.frontier,
                context.fetch_timeout,
                context.max_urls,
            )
            .await;
        }

        let mut workers = Vec::with_capacity(config.concurrency());
        for worker_id in 0..config.concurrency() {
            let context = Arc::clone(&context);
            workers.push(tokio::spawn(async move {
                worker_loop(worker_id, context).await;
            }));
        }
        for worker in workers {
            if let Err(e) = worker.await {
                error!("crawl worker panicked: {e}");
            }
        }

        let snapshot = context.stats.snapshot();
        info!(
            "crawl finished: {} crawled, {} discovered, {} errors",
            snapshot.crawled, snapshot.discovered, snapshot.errors
        );
        // Either Running (natural drain) or Stopping (cancelled) ends here.
        self.status.store(CrawlStatus::Stopped);
    }

    /// Request cooperative cancellation of the active session.
    ///
    /// In-flight page loads finish; nothing new is dequeued. Status moves to
    /// `Stopping` immediately and settles to `Stopped` when the workers have
    /// drained.
    pub fn stop_crawl(&self) -> String {
        if !self.status.transition(CrawlStatus::Running, CrawlStatus::Stopping) {
            return "no crawl is running".to_string();
        }
        if let Some(run) = self.run.read().as_ref() {
            run.stop.store(true, Ordering::Release);
        }
        "crawl stopping".to_string()
    }

    /// Point-in-time snapshot of the session. Never blocks on crawl work.
    #[must_use]
    pub fn get_status(&self) -> StatusSnapshot {
        let status = self.status.load();
        match self.run.read().as_ref() {
            Some(run) => StatusSnapshot {
                status,
                mode: Some(run.mode),
                base_url: run.base_url.clone(),
                base_domain: run.base_domain.clone(),
                stats: run.stats.snapshot(),
            },
            None => StatusSnapshot {
                status,
                mode: None,
                base_url: String::new(),
                base_domain: String::new(),
                stats: Default::default(),
            },
        }
    }

    /// Change the global request rate, effective from the next acquire.
    pub fn update_rate(&self, requests_per_second: f64) {
        self.rate_limiter.update_rate(requests_per_second);
    }

    /// Wait for the active session's supervisor to finish. Returns
    /// immediately when no session is active.
    pub async fn wait_for_completion(&self) {
        let handle = self.supervisor.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await
                && !e.is_cancelled()
            {
                error!("crawl supervisor task failed: {e}");
            }
        }
    }

    /// Shut down the browser pool. The next JavaScript-enabled session will
    /// relaunch it.
    pub async fn teardown_renderer(&self) {
        if let Some(pool) = self.pool.lock().await.take() {
            pool.teardown().await;
        }
    }

    async fn ensure_pool(&self, config: &CrawlConfig) -> Result<Arc<PagePool>> {
        let mut slot = self.pool.lock().await;
        if let Some(pool) = slot.as_ref()
            && pool.is_initialized()
        {
            return Ok(Arc::clone(pool));
        }
        let pool = Arc::new(PagePool::new(config.js().clone()));
        pool.initialize().await?;
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }
}

/// Resolved inputs for one session.
struct SessionPlan {
    mode: CrawlMode,
    base_url: String,
    base_domain: String,
    max_depth: u32,
    seeds: Vec<String>,
}

/// Turn a start request into a session plan.
///
/// A non-empty `urlList` selects list mode regardless of `url`; list entries
/// default to `http://` when schemeless and are crawled at depth 0 with no
/// link expansion. Standard mode defaults to `https://` and a seed with a
/// non-root path pins the crawl to that single page.
fn resolve_session(
    request: &StartCrawlRequest,
    config: &CrawlConfig,
) -> Result<SessionPlan, CrawlError> {
    if let Some(entries) = request.url_list.as_ref().filter(|list| !list.is_empty()) {
        let mut seeds = Vec::with_capacity(entries.len());
        for entry in entries {
            match normalize_url(entry, "http") {
                Some(url) => seeds.push(url),
                None => debug!("skipping unparseable list entry: {entry}"),
            }
        }
        let Some(first) = seeds.first() else {
            return Err(CrawlError::Input(
                "urlList contains no valid urls".to_string(),
            ));
        };
        let (base_url, base_domain) = origin_of(first)?;
        return Ok(SessionPlan {
            mode: CrawlMode::List,
            base_url,
            base_domain,
            max_depth: 0,
            seeds,
        });
    }

    let seed = request
        .url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CrawlError::Input("neither url nor urlList provided".to_string()))?;

    let normalized = normalize_url(seed, "https")
        .ok_or_else(|| CrawlError::Input(format!("unparseable url: {seed}")))?;
    let (base_url, base_domain) = origin_of(&normalized)?;

    // Seeding from a specific page rather than the site root pins the crawl
    // to that one page.
    let parsed = Url::parse(&normalized)
        .map_err(|e| CrawlError::Input(format!("unparseable url: {e}")))?;
    let max_depth = if parsed.path() == "/" {
        config.max_depth()
    } else {
        0
    };

    Ok(SessionPlan {
        mode: CrawlMode::Standard,
        base_url,
        base_domain,
        max_depth,
        seeds: vec![normalized],
    })
}

/// Scheme-plus-host origin and lowercased host of a normalized URL.
fn origin_of(url: &str) -> Result<(String, String), CrawlError> {
    let parsed =
        Url::parse(url).map_err(|e| CrawlError::Input(format!("unparseable url: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| CrawlError::Input(format!("url has no host: {url}")))?
        .to_lowercase();
    Ok((parsed.origin().ascii_serialization(), host))
}

/// One worker: pull from the frontier, pace, fetch, expand.
///
/// Exits when the stop flag is set, when the attempt budget is exhausted, or
/// when the frontier is empty and no peer has work in flight that could
/// refill it.
async fn worker_loop(worker_id: usize, ctx: Arc<WorkerContext>) {
    loop {
        if ctx.stop.load(Ordering::Acquire) {
            break;
        }

        // Count ourselves in flight before touching the queue: a peer that
        // finds the frontier empty must still see this worker as a potential
        // refiller, or it exits early and the crawl loses concurrency.
        let _guard = InFlightGuard::new(&ctx.in_flight);

        let Some(entry) = ctx.frontier.next().await else {
            drop(_guard);
            if ctx.in_flight.load(Ordering::Acquire) == 0 {
                break;
            }
            tokio::time::sleep(IDLE_POLL).await;
            continue;
        };

        // Claim an attempt slot before any network work so the max_urls cap
        // is exact even with concurrent workers.
        let claimed = ctx
            .attempted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < ctx.max_urls).then_some(n + 1)
            });
        if claimed.is_err() {
            debug!("worker {worker_id}: url budget exhausted");
            break;
        }

        ctx.rate_limiter.acquire().await;
        // The paced wait can be long; honor a stop requested during it.
        if ctx.stop.load(Ordering::Acquire) {
            break;
        }

        match fetch_page(&ctx, &entry.url).await {
            Ok(page) => {
                ctx.stats.record_crawled();
                debug!(
                    "worker {worker_id}: crawled {} (status {}, depth {})",
                    entry.url, page.status, entry.depth
                );
                if ctx.mode == CrawlMode::Standard && page.status < 400 && !page.html.is_empty() {
                    ctx.frontier
                        .extract_links(&page.html, &entry.url, entry.depth)
                        .await;
                }
            }
            Err(e) => {
                ctx.stats.record_error();
                warn!("worker {worker_id}: fetch failed for {}: {e}", entry.url);
            }
        }
    }
}

/// Fetch one URL, rendering in the browser when the session has a pool and
/// the URL looks like an HTML document.
async fn fetch_page(ctx: &WorkerContext, url: &str) -> Result<PageResult> {
    if let Some(pool) = ctx.pool.as_ref()
        && PagePool::should_render(url)
    {
        let rendered = pool.render(url).await.map_err(|e| anyhow!(e))?;
        return Ok(PageResult {
            status: rendered.status_code,
            html: rendered.html,
        });
    }

    let response = ctx
        .fetcher
        .fetch(url.to_string(), ctx.fetch_timeout)
        .await
        .map_err(|e| anyhow!(e))?;
    let is_html = response
        .headers
        .get("content-type")
        .is_none_or(|value| value.contains("text/html"));
    Ok(PageResult {
        status: response.status,
        html: if is_html { response.body } else { String::new() },
    })
}
