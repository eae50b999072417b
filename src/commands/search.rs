use anyhow::Result;

use darkgather_core::config::{AppConfig, GeneralConfig};
use darkgather_search::{PlaceholderSearch, SearchProvider};
use darkgather_storage::DataStore;

pub async fn run(config: AppConfig, query: String, limit: Option<usize>, save: bool) -> Result<()> {
    let limit = GeneralConfig::clamp_search_limit(limit.unwrap_or(config.general.default_search_limit));
    let results = PlaceholderSearch.search(&query, limit).await;

    println!("Found {} results for '{}' (demo mode):\n", results.len(), query);
    for r in &results {
        println!("  {} - {}", r.url, r.title);
    }

    if save {
        let store = DataStore::open(&config.storage).await?;
        let report = store.save(&results).await?;
        println!("\nSaved {}/{} results", report.saved, report.attempted);
    }
    Ok(())
}
