//! Session state: status machine, mode, and contended-safe stats counters.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Lifecycle state of the crawl orchestrator.
///
/// Transitions: `Idle → Running → {Stopping → Stopped} | Failed`. A new
/// `start_crawl` re-enters `Running` from any terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Idle,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// How the session was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    /// Domain-scoped, depth-bounded, link-expanding crawl from one seed.
    Standard,
    /// Fixed URL set, depth 0, no link expansion.
    List,
}

/// Atomic cell holding a `CrawlStatus`, so status reads never contend with
/// the workers updating counters.
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn new(status: CrawlStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub(crate) fn load(&self) -> CrawlStatus {
        match self.0.load(Ordering::Acquire) {
            0 => CrawlStatus::Idle,
            1 => CrawlStatus::Running,
            2 => CrawlStatus::Stopping,
            3 => CrawlStatus::Stopped,
            _ => CrawlStatus::Failed,
        }
    }

    pub(crate) fn store(&self, status: CrawlStatus) {
        self.0.store(status as u8, Ordering::Release);
    }

    /// Transition only when currently in `from`. Returns whether it applied.
    pub(crate) fn transition(&self, from: CrawlStatus, to: CrawlStatus) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claim the session by moving a startable state to `Running`. Exactly
    /// one of any number of concurrent claimants wins; `Running` and
    /// `Stopping` reject the claim.
    pub(crate) fn try_begin(&self) -> bool {
        const STARTABLE: [CrawlStatus; 3] =
            [CrawlStatus::Idle, CrawlStatus::Stopped, CrawlStatus::Failed];
        STARTABLE
            .iter()
            .any(|&from| self.transition(from, CrawlStatus::Running))
    }
}

/// Session counters written by many workers and read by status queries.
/// Plain atomics: high write contention never blocks a reader.
#[derive(Debug, Default)]
pub struct CrawlStats {
    discovered: AtomicUsize,
    crawled: AtomicUsize,
    errors: AtomicUsize,
}

impl CrawlStats {
    pub fn record_discovered(&self) {
        self.discovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_crawled(&self) {
        self.crawled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn discovered(&self) -> usize {
        self.discovered.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn crawled(&self) -> usize {
        self.crawled.load(Ordering::Relaxed)
    }

    /// Non-blocking point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            discovered: self.discovered.load(Ordering::Relaxed),
            crawled: self.crawled.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub discovered: usize,
    pub crawled: usize,
    pub errors: usize,
}

/// Snapshot returned by `get_status`, shaped for the JSON API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub status: CrawlStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<CrawlMode>,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub base_domain: String,
    pub stats: StatsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_cell_roundtrip() {
        let cell = StatusCell::new(CrawlStatus::Idle);
        assert_eq!(cell.load(), CrawlStatus::Idle);
        cell.store(CrawlStatus::Running);
        assert_eq!(cell.load(), CrawlStatus::Running);
    }

    #[test]
    fn transition_requires_expected_state() {
        let cell = StatusCell::new(CrawlStatus::Running);
        assert!(cell.transition(CrawlStatus::Running, CrawlStatus::Stopping));
        assert!(!cell.transition(CrawlStatus::Running, CrawlStatus::Stopping));
        assert_eq!(cell.load(), CrawlStatus::Stopping);
    }

    #[test]
    fn try_begin_claims_only_startable_states() {
        let cell = StatusCell::new(CrawlStatus::Idle);
        assert!(cell.try_begin());
        // A second claim loses while the first session runs.
        assert!(!cell.try_begin());
        cell.store(CrawlStatus::Stopping);
        assert!(!cell.try_begin());
        for terminal in [CrawlStatus::Stopped, CrawlStatus::Failed] {
            cell.store(terminal);
            assert!(cell.try_begin());
            assert_eq!(cell.load(), CrawlStatus::Running);
        }
    }

    #[test]
    fn stats_snapshot_copies_counters() {
        let stats = CrawlStats::default();
        stats.record_discovered();
        stats.record_discovered();
        stats.record_crawled();
        stats.record_error();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.discovered, 2);
        assert_eq!(snapshot.crawled, 1);
        assert_eq!(snapshot.errors, 1);
    }

    #[test]
    fn status_snapshot_serializes_camel_case() {
        let snapshot = StatusSnapshot {
            status: CrawlStatus::Running,
            mode: Some(CrawlMode::List),
            base_url: "https://example.com".to_string(),
            base_domain: "example.com".to_string(),
            stats: StatsSnapshot::default(),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["mode"], "list");
        assert!(json.get("baseUrl").is_some());
    }
}
