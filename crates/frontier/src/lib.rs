use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashSet;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use darkgather_core::CrawlTarget;

/// Per-invocation crawl state shared by all workers: the visited set, the
/// depth-first work stack and the bookkeeping that tells workers when the
/// frontier is exhausted. Nothing here outlives one `scrape` call.
pub struct CrawlContext {
    max_depth: u32,
    /// Normalized URLs handed out to a worker. Only ever grows.
    visited: DashSet<String>,
    stack: Mutex<Vec<CrawlTarget>>,
    /// Targets popped but not yet completed. Their children may still arrive.
    in_flight: AtomicUsize,
    notify: Notify,
    cancel: CancellationToken,
}

impl CrawlContext {
    pub fn new(seed: CrawlTarget, max_depth: u32, cancel: CancellationToken) -> Self {
        Self {
            max_depth,
            visited: DashSet::new(),
            stack: Mutex::new(vec![seed]),
            in_flight: AtomicUsize::new(0),
            notify: Notify::new(),
            cancel,
        }
    }

    /// Dedup key: no fragment, no trailing slash on non-root paths. Scheme and
    /// host are already lowercase after parsing; path and query keep their case.
    pub fn normalize_url(url: &Url) -> String {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        let path = normalized.path().to_string();
        if path.len() > 1 && path.ends_with('/') {
            normalized.set_path(&path[..path.len() - 1]);
        }
        normalized.to_string()
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(&Self::normalize_url(url))
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Queue children of a completed page. Over-depth and already visited
    /// targets are dropped here; the authoritative check happens in `next`.
    pub async fn push_batch(&self, targets: Vec<CrawlTarget>) -> usize {
        let fresh: Vec<CrawlTarget> = targets
            .into_iter()
            .filter(|t| t.depth <= self.max_depth && !self.is_visited(&t.url))
            .collect();
        let added = fresh.len();
        if added == 0 {
            return 0;
        }
        {
            let mut stack = self.stack.lock().await;
            // Reversed so the first link on the page is expanded first.
            stack.extend(fresh.into_iter().rev());
        }
        self.notify.notify_waiters();
        added
    }

    /// Next unvisited target, marking it visited. Waits while other workers
    /// may still produce links; `None` once the frontier is drained or the
    /// crawl was cancelled.
    pub async fn next(&self) -> Option<CrawlTarget> {
        loop {
            // Registered before checking so a push between check and await is not missed.
            let notified = self.notify.notified();
            if self.cancel.is_cancelled() {
                return None;
            }
            {
                let mut stack = self.stack.lock().await;
                while let Some(target) = stack.pop() {
                    if target.depth > self.max_depth {
                        continue;
                    }
                    if !self.visited.insert(Self::normalize_url(&target.url)) {
                        debug!(url = %target.url, "already visited");
                        continue;
                    }
                    self.in_flight.fetch_add(1, Ordering::SeqCst);
                    return Some(target);
                }
                if self.in_flight.load(Ordering::SeqCst) == 0 {
                    return None;
                }
            }
            tokio::select! {
                _ = notified => {}
                _ = self.cancel.cancelled() => return None,
            }
        }
    }

    /// Marks a target handed out by `next` as finished, after its children were pushed.
    pub fn complete(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub async fn pending(&self) -> usize {
        self.stack.lock().await.len()
    }
}
