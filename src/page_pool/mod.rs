//! Fixed-size pool of pre-created browser pages for JavaScript rendering.
//!
//! One headless browser process hosts `pool_size` pages (tabs). Workers
//! borrow a page, render one URL, and return it; the pool never grows, so
//! browser memory stays bounded no matter how many workers run. The pool
//! outlives crawl sessions and is only torn down explicitly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, ResourceType, SetUserAgentOverrideParams,
};
use futures::StreamExt;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::browser_setup::launch_browser;
use crate::config::JsConfig;
use crate::error::PoolError;

/// How long `render` waits for a free page before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(60);

/// Cap on the post-navigation wait for network activity to go quiet.
const NETWORK_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// File extensions that never benefit from browser rendering.
const NON_RENDERABLE_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".css", ".js", ".xml", ".txt", ".zip", ".svg",
    ".ico", ".woff", ".woff2", ".ttf", ".eot",
];

/// Result of rendering a page in the browser.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Post-JavaScript serialized DOM.
    pub html: String,
    /// HTTP status of the main document response. Defaults to 200 when the
    /// browser does not surface one.
    pub status_code: u16,
}

struct BrowserHandle {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

/// Bounded checkout discipline: an idle list plus a semaphore whose permit
/// count matches it while the pool is open.
///
/// Borrowed permits are forgotten and restored on release, so at most
/// `capacity` items are ever checked out. Permit bookkeeping happens under
/// the idle-list lock; `drain` and `release` can therefore never disagree
/// about whether an item re-entered the pool.
struct PoolSlots<T> {
    idle: Mutex<Vec<T>>,
    permits: Semaphore,
    open: AtomicBool,
}

impl<T> PoolSlots<T> {
    fn new() -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            permits: Semaphore::new(0),
            open: AtomicBool::new(false),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Stock the pool and open it for borrowers.
    async fn open_with(&self, items: Vec<T>) {
        let mut idle = self.idle.lock().await;
        self.permits.add_permits(items.len());
        *idle = items;
        self.open.store(true, Ordering::Release);
    }

    /// Borrow an item, waiting up to `max_wait` for one to free up.
    async fn acquire(&self, max_wait: Duration) -> Result<T, PoolError> {
        if !self.is_open() {
            return Err(PoolError::NotInitialized);
        }
        let permit = timeout(max_wait, self.permits.acquire())
            .await
            .map_err(|_| PoolError::Timeout(max_wait))?
            .map_err(|_| PoolError::NotInitialized)?;
        // Capacity travels with the borrowed item; release() restores it.
        permit.forget();

        match self.idle.lock().await.pop() {
            Some(item) => Ok(item),
            None => {
                // Only reachable mid-teardown; the permit is discarded along
                // with the capacity it represented.
                Err(PoolError::NotInitialized)
            }
        }
    }

    /// Return a borrowed item. When the pool was closed while the item was
    /// out, it is handed back to the caller for disposal and no permit is
    /// restored.
    async fn release(&self, item: T) -> Option<T> {
        let mut idle = self.idle.lock().await;
        if !self.open.load(Ordering::Acquire) {
            return Some(item);
        }
        idle.push(item);
        self.permits.add_permits(1);
        None
    }

    /// Close the pool and reclaim every idle item. In-flight borrowers keep
    /// theirs; their permits were forgotten at acquire time.
    async fn drain(&self) -> Vec<T> {
        self.open.store(false, Ordering::Release);
        let mut idle = self.idle.lock().await;
        while self.permits.try_acquire().map(|p| p.forget()).is_ok() {}
        std::mem::take(&mut *idle)
    }
}

/// Bounded pool of browser pages.
pub struct PagePool {
    config: JsConfig,
    browser: Mutex<Option<BrowserHandle>>,
    slots: PoolSlots<Page>,
}

impl PagePool {
    #[must_use]
    pub fn new(config: JsConfig) -> Self {
        Self {
            config,
            browser: Mutex::new(None),
            slots: PoolSlots::new(),
        }
    }

    /// Launch the browser and pre-create the pool's pages. Idempotent; a
    /// second call on an initialized pool is a no-op.
    ///
    /// Individual page creation failures are tolerated as long as at least
    /// one page comes up; the pool then runs at reduced capacity.
    pub async fn initialize(&self) -> Result<(), PoolError> {
        if self.slots.is_open() {
            return Ok(());
        }

        let mut browser_slot = self.browser.lock().await;
        if self.slots.is_open() {
            return Ok(());
        }

        let (mut browser, handler_task) = launch_browser(&self.config)
            .await
            .map_err(|e| PoolError::Initialization(e.to_string()))?;

        let mut pages = Vec::with_capacity(self.config.pool_size);
        for index in 0..self.config.pool_size {
            match browser.new_page("about:blank").await {
                Ok(page) => {
                    if let Err(e) = configure_page(&page, &self.config).await {
                        warn!(index, "failed to configure pooled page: {e}");
                    }
                    pages.push(page);
                }
                Err(e) => {
                    warn!(index, "failed to create pooled page: {e}");
                }
            }
        }

        if pages.is_empty() {
            handler_task.abort();
            if let Err(e) = browser.close().await {
                debug!("browser close after failed init: {e}");
            }
            return Err(PoolError::Initialization(
                "no browser pages could be created".to_string(),
            ));
        }

        info!(
            pages = pages.len(),
            requested = self.config.pool_size,
            "page pool initialized"
        );

        self.slots.open_with(pages).await;
        *browser_slot = Some(BrowserHandle {
            browser,
            handler_task,
        });
        Ok(())
    }

    /// Whether the pool has a live browser behind it.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.slots.is_open()
    }

    /// Return a borrowed page, resetting it so the next borrower starts from
    /// a blank slate. Reset failures are logged and the page is returned
    /// anyway; a stuck page will fail its next navigation visibly. A page
    /// whose pool was torn down mid-render is closed instead of re-pooled.
    async fn release(&self, page: Page) {
        if let Err(e) = page.goto("about:blank").await {
            warn!("failed to reset pooled page: {e}");
        }
        if let Some(page) = self.slots.release(page).await {
            if let Err(e) = page.close().await {
                debug!("closing page returned to a torn-down pool: {e}");
            }
        }
    }

    /// Render `url` with JavaScript execution and return the resulting DOM.
    pub async fn render(&self, url: &str) -> Result<RenderedPage, PoolError> {
        let page = self.slots.acquire(ACQUIRE_TIMEOUT).await?;
        let result = self.render_on(&page, url).await;
        self.release(page).await;
        result
    }

    async fn render_on(&self, page: &Page, url: &str) -> Result<RenderedPage, PoolError> {
        let navigation_timeout = Duration::from_secs(self.config.navigation_timeout_secs);

        // Watch main-document responses so the HTTP status survives the
        // render. Subscribed before navigation to avoid missing the event.
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| PoolError::Browser(e.to_string()))?;

        match timeout(navigation_timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(PoolError::Navigation(e.to_string())),
            Err(_) => return Err(PoolError::NavigationTimeout(navigation_timeout)),
        }

        // Best-effort wait for the network to settle; slow pages are rendered
        // with whatever has loaded so far.
        if timeout(NETWORK_IDLE_TIMEOUT, page.wait_for_navigation())
            .await
            .is_err()
        {
            debug!("network did not go idle within {NETWORK_IDLE_TIMEOUT:?} for {url}");
        }

        tokio::time::sleep(Duration::from_secs(self.config.settle_secs)).await;

        let mut status_code = 200u16;
        while let Ok(Some(event)) = timeout(Duration::from_millis(10), responses.next()).await {
            if event.r#type == ResourceType::Document {
                status_code = event.response.status as u16;
            }
        }

        let html = page
            .content()
            .await
            .map_err(|e| PoolError::Browser(e.to_string()))?;

        Ok(RenderedPage { html, status_code })
    }

    /// Whether a URL's path looks like an HTML document worth rendering.
    #[must_use]
    pub fn should_render(url: &str) -> bool {
        let path = url
            .split_once('?')
            .map_or(url, |(before, _)| before)
            .to_lowercase();
        !NON_RENDERABLE_EXTENSIONS
            .iter()
            .any(|ext| path.ends_with(ext))
    }

    /// Close every page and the browser process. The pool can be
    /// re-initialized afterwards.
    pub async fn teardown(&self) {
        for page in self.slots.drain().await {
            if let Err(e) = page.close().await {
                debug!("page close during teardown: {e}");
            }
        }

        if let Some(mut handle) = self.browser.lock().await.take() {
            if let Err(e) = handle.browser.close().await {
                warn!("browser close during teardown: {e}");
            }
            if let Err(e) = handle.browser.wait().await {
                debug!("browser wait during teardown: {e}");
            }
            handle.handler_task.abort();
        }
        info!("page pool torn down");
    }
}

/// Apply the configured user agent and viewport to one page, so rendering
/// does not depend on launch-time flags reaching every target.
async fn configure_page(page: &Page, config: &JsConfig) -> Result<(), PoolError> {
    page.set_user_agent(SetUserAgentOverrideParams::new(config.user_agent.clone()))
        .await
        .map_err(|e| PoolError::Browser(e.to_string()))?;
    page.execute(
        SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(config.viewport_width))
            .height(i64::from(config.viewport_height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(PoolError::Browser)?,
    )
    .await
    .map_err(|e| PoolError::Browser(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn should_render_skips_binary_extensions() {
        assert!(!PagePool::should_render("https://example.com/file.pdf"));
        assert!(!PagePool::should_render("https://example.com/IMAGE.PNG"));
        assert!(!PagePool::should_render("https://example.com/font.woff2"));
    }

    #[test]
    fn should_render_accepts_pages() {
        assert!(PagePool::should_render("https://example.com/"));
        assert!(PagePool::should_render("https://example.com/about"));
        assert!(PagePool::should_render("https://example.com/page.html"));
    }

    #[test]
    fn should_render_ignores_query_string() {
        assert!(!PagePool::should_render(
            "https://example.com/doc.pdf?download=1"
        ));
        assert!(PagePool::should_render("https://example.com/search?q=.pdf"));
    }

    #[tokio::test]
    async fn uninitialized_pool_rejects_acquire() {
        let slots: PoolSlots<u32> = PoolSlots::new();
        let err = slots.acquire(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, PoolError::NotInitialized));
    }

    #[tokio::test]
    async fn checkout_is_bounded_by_capacity() {
        let slots = PoolSlots::new();
        slots.open_with(vec![7u32]).await;

        let item = slots.acquire(Duration::from_millis(10)).await.unwrap();
        // The single slot is out; a second borrower times out.
        let err = slots.acquire(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, PoolError::Timeout(_)));

        assert!(slots.release(item).await.is_none());
        assert_eq!(slots.acquire(Duration::from_millis(10)).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn blocked_acquire_resumes_on_release() {
        let slots = Arc::new(PoolSlots::new());
        slots.open_with(vec![1u32]).await;

        let item = slots.acquire(Duration::from_millis(10)).await.unwrap();
        let waiter = tokio::spawn({
            let slots = Arc::clone(&slots);
            async move { slots.acquire(Duration::from_secs(2)).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        slots.release(item).await;
        assert_eq!(waiter.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn release_after_drain_hands_the_item_back() {
        let slots = PoolSlots::new();
        slots.open_with(vec![1u32, 2]).await;
        let borrowed = slots.acquire(Duration::from_millis(10)).await.unwrap();

        // Only the idle item is reclaimed; the borrowed one stays out.
        let drained = slots.drain().await;
        assert_eq!(drained.len(), 1);

        assert_eq!(slots.release(borrowed).await, Some(borrowed));
        assert!(matches!(
            slots.acquire(Duration::from_millis(10)).await.unwrap_err(),
            PoolError::NotInitialized
        ));
    }

    #[tokio::test]
    async fn reopen_after_drain_restores_exact_capacity() {
        let slots = PoolSlots::new();
        slots.open_with(vec![1u32]).await;
        slots.drain().await;

        slots.open_with(vec![5u32]).await;
        assert_eq!(slots.acquire(Duration::from_millis(10)).await.unwrap(), 5);
        assert!(matches!(
            slots.acquire(Duration::from_millis(30)).await.unwrap_err(),
            PoolError::Timeout(_)
        ));
    }
}
