use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use darkgather_core::config::GeneralConfig;
use darkgather_core::{ItemKind, PageItem};

/// Free-text lookup across hidden services.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Vec<PageItem>;
}

/// Demo provider: no real search backend exists, so it fabricates at most
/// [`PlaceholderSearch::MAX_RESULTS`] clearly labelled `search_result` items.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderSearch;

impl PlaceholderSearch {
    pub const MAX_RESULTS: usize = 5;
}

#[async_trait]
impl SearchProvider for PlaceholderSearch {
    async fn search(&self, query: &str, limit: usize) -> Vec<PageItem> {
        let limit = GeneralConfig::clamp_search_limit(limit);
        warn!(query, limit, "search is not implemented, returning placeholder results");

        (0..limit.min(Self::MAX_RESULTS))
            .map(|i| PageItem {
                kind: ItemKind::SearchResult,
                title: format!("Result for '{}' #{}", query, i + 1),
                url: format!("http://{}.onion/", random_host_label()),
                content: format!("Sample content containing {}", query),
                discovered_at: chrono::Utc::now(),
                link_count: 0,
            })
            .collect()
    }
}

/// Sixteen base32 characters, the shape of a v2 address label.
fn random_host_label() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
