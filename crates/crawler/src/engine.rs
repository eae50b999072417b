use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use darkgather_core::config::CrawlConfig;
use darkgather_core::{CrawlError, CrawlTarget, PageItem};
use darkgather_frontier::CrawlContext;
use darkgather_networks::{Fetcher, Jitter};
use darkgather_parser::{extract_links, extract_page_data, AddressRule};

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub max_links_per_page: usize,
    pub workers: usize,
    /// Attempt budget handed to the fetcher for every page.
    pub attempts: u32,
    /// Pause before expanding a discovered link.
    pub expansion_jitter: Jitter,
}

impl CrawlSettings {
    pub fn from_config(crawl: &CrawlConfig) -> Self {
        Self {
            max_links_per_page: crawl.max_links_per_page,
            workers: crawl.workers.max(1),
            attempts: crawl.max_retries.max(1),
            expansion_jitter: Jitter::from_millis(crawl.min_delay_ms, crawl.max_delay_ms),
        }
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self::from_config(&CrawlConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Crawling,
    Done,
    Failed,
}

#[derive(Debug)]
pub struct CrawlReport {
    pub items: Vec<PageItem>,
    pub state: CrawlState,
    pub pages_fetched: usize,
    pub branches_failed: usize,
    pub cancelled: bool,
}

#[derive(Default)]
struct Counters {
    fetched: AtomicUsize,
    failed: AtomicUsize,
}

/// Depth-bounded crawl from one seed. Each call gets its own visited set,
/// so repeated scrapes never leak state into each other.
pub struct Crawler {
    fetcher: Arc<Fetcher>,
    rule: AddressRule,
    settings: CrawlSettings,
    state: Mutex<CrawlState>,
}

impl Crawler {
    pub fn new(fetcher: Arc<Fetcher>, rule: AddressRule, settings: CrawlSettings) -> Self {
        Self {
            fetcher,
            rule,
            settings,
            state: Mutex::new(CrawlState::Idle),
        }
    }

    pub fn state(&self) -> CrawlState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: CrawlState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Every page reachable from `seed` within `max_depth` hops that could be
    /// fetched. Unreachable branches are dropped; an unreachable seed yields
    /// an empty list.
    pub async fn scrape(&self, seed: &str, max_depth: u32) -> Result<Vec<PageItem>, CrawlError> {
        self.run(seed, max_depth, CancellationToken::new())
            .await
            .map(|report| report.items)
    }

    /// Like `scrape`, stopping early once `cancel` fires and returning what
    /// was collected so far.
    pub async fn run(
        &self,
        seed: &str,
        max_depth: u32,
        cancel: CancellationToken,
    ) -> Result<CrawlReport, CrawlError> {
        let seed_url = self
            .rule
            .parse(seed)
            .ok_or_else(|| CrawlError::InvalidTarget(seed.to_string()))?;

        self.set_state(CrawlState::Crawling);
        info!(seed = %seed_url, max_depth, workers = self.settings.workers, "crawl started");

        // Child token: a dead worker stops its siblings without cancelling the caller.
        let ctx = Arc::new(CrawlContext::new(
            CrawlTarget::seed(seed_url),
            max_depth,
            cancel.child_token(),
        ));
        let results: Arc<Mutex<Vec<PageItem>>> = Arc::new(Mutex::new(Vec::new()));
        let counters = Arc::new(Counters::default());

        let mut workers = JoinSet::new();
        for worker_id in 0..self.settings.workers.max(1) {
            let worker = Worker {
                id: worker_id,
                ctx: Arc::clone(&ctx),
                fetcher: Arc::clone(&self.fetcher),
                rule: self.rule,
                settings: self.settings.clone(),
                results: Arc::clone(&results),
                counters: Arc::clone(&counters),
            };
            workers.spawn(worker.run());
        }

        let mut state = CrawlState::Done;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "crawl worker died, stopping crawl");
                state = CrawlState::Failed;
                ctx.cancel_token().cancel();
            }
        }

        let items = std::mem::take(&mut *results.lock().unwrap_or_else(|e| e.into_inner()));
        let report = CrawlReport {
            pages_fetched: counters.fetched.load(Ordering::Relaxed),
            branches_failed: counters.failed.load(Ordering::Relaxed),
            cancelled: cancel.is_cancelled(),
            state,
            items,
        };
        self.set_state(state);

        info!(
            items = report.items.len(),
            visited = ctx.visited_count(),
            failed = report.branches_failed,
            cancelled = report.cancelled,
            "crawl finished"
        );
        Ok(report)
    }
}

struct Worker {
    id: usize,
    ctx: Arc<CrawlContext>,
    fetcher: Arc<Fetcher>,
    rule: AddressRule,
    settings: CrawlSettings,
    results: Arc<Mutex<Vec<PageItem>>>,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(self) {
        debug!(worker_id = self.id, "worker started");
        while let Some(target) = self.ctx.next().await {
            let cancel = self.ctx.cancel_token().clone();
            let finished = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                _ = self.visit(&target) => true,
            };
            self.ctx.complete();
            if !finished {
                debug!(worker_id = self.id, url = %target.url, "cancelled mid-page");
                break;
            }
        }
        debug!(worker_id = self.id, "worker stopped");
    }

    async fn visit(&self, target: &CrawlTarget) {
        if target.depth > 0 {
            self.settings.expansion_jitter.sleep().await;
        }
        info!(worker_id = self.id, url = %target.url, depth = target.depth, "crawling");

        let html = match self.fetcher.fetch(&target.url, self.settings.attempts).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %target.url, error = %e, "abandoning branch");
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        self.counters.fetched.fetch_add(1, Ordering::Relaxed);

        let item = extract_page_data(target.url.as_str(), &html);
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(item);

        if target.depth >= self.ctx.max_depth() {
            return;
        }
        let children: Vec<CrawlTarget> =
            extract_links(&target.url, &html, &self.rule, self.settings.max_links_per_page)
                .into_iter()
                .filter(|url| !self.ctx.is_visited(url))
                .map(|url| target.child(url))
                .collect();
        let queued = self.ctx.push_batch(children).await;
        debug!(url = %target.url, queued, "links queued");
    }
}
