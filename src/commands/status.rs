use anyhow::Result;

use darkgather_core::config::AppConfig;
use darkgather_networks::TorGateway;
use darkgather_storage::DataStore;

pub async fn run(config: AppConfig) -> Result<()> {
    let gateway = TorGateway::new(&config.tor)?;
    let reachable = gateway.health_check().await;

    let store = DataStore::open(&config.storage).await?;
    let stats = store.stats().await?;
    let scans = store.recent_scans(5).await?;

    println!(
        "SOCKS proxy:    {} ({})",
        gateway.socks_addr(),
        if reachable { "reachable" } else { "UNREACHABLE" }
    );
    println!("Total entries:  {}", stats.total);
    println!("Unique domains: {}", stats.domains);
    match stats.last_updated {
        Some(t) => println!("Last updated:   {}", t.format("%Y-%m-%d %H:%M:%S")),
        None => println!("Last updated:   never"),
    }

    if !scans.is_empty() {
        println!("\nRecent scans:");
        for scan in scans {
            println!(
                "  #{:<4} {}  {:>4} items  {}",
                scan.id,
                scan.scan_start.format("%Y-%m-%d %H:%M:%S"),
                scan.items_collected,
                scan.domains_scanned.join(", ")
            );
        }
    }
    Ok(())
}
