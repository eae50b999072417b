use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use darkgather_core::config::{AppConfig, GeneralConfig};
use darkgather_crawler::{CrawlSettings, CrawlState, Crawler};
use darkgather_networks::{FetchPolicy, Fetcher, TorGateway};
use darkgather_parser::AddressRule;
use darkgather_storage::DataStore;

/// Wires the gateway, fetcher and address rule from config.
pub fn build_crawler(config: &AppConfig, gateway: Arc<TorGateway>) -> Crawler {
    let policy = FetchPolicy::from_config(&config.crawl, &config.tor);
    let fetcher = Arc::new(Fetcher::new(gateway.clone(), gateway, policy));
    Crawler::new(
        fetcher,
        AddressRule::new(config.crawl.address_version),
        CrawlSettings::from_config(&config.crawl),
    )
}

pub async fn run_scrape(config: AppConfig, url: String, depth: Option<u32>) -> Result<()> {
    let depth = GeneralConfig::clamp_depth(depth.unwrap_or(config.general.default_depth));

    let gateway = Arc::new(TorGateway::new(&config.tor)?);
    if !gateway.health_check().await {
        warn!(proxy = %gateway.socks_addr(), "SOCKS endpoint unreachable, fetches will likely fail");
    }
    let store = DataStore::open(&config.storage).await?;
    let crawler = build_crawler(&config, gateway);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping crawl and keeping partial results");
                cancel.cancel();
            }
        })
    };

    info!(url = %url, depth, "starting scrape");
    let outcome = crawler.run(&url, depth, cancel).await;
    interrupt.abort();
    let report = outcome?;

    // Partial results are saved too, whatever stopped the crawl.
    let saved = store.save(&report.items).await?;

    println!("Crawl {}", describe(report.state, report.cancelled));
    println!("  Pages fetched:   {}", report.pages_fetched);
    println!("  Failed branches: {}", report.branches_failed);
    println!("  Items saved:     {}/{}", saved.saved, saved.attempted);
    Ok(())
}

fn describe(state: CrawlState, cancelled: bool) -> &'static str {
    match (state, cancelled) {
        (CrawlState::Failed, _) => "failed (partial results kept)",
        (_, true) => "interrupted (partial results kept)",
        _ => "complete",
    }
}
