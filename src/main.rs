mod cli;
mod commands;
mod crawl;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use darkgather_core::config::AppConfig;

use crate::cli::{Cli, Commands};
use crate::crawl::run_scrape;

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_stack_size(8 * 1024 * 1024)
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        warn!(path = %cli.config, "config file not found, using defaults");
        include_str!("../config/default.toml").to_string()
    });
    let mut config: AppConfig = toml::from_str(&config_str)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    match cli.command {
        Commands::Scrape { url, depth } => {
            run_scrape(config, url, depth).await?;
        }
        Commands::Search { query, limit, save } => {
            commands::search::run(config, query, limit, save).await?;
        }
        Commands::Status => {
            commands::status::run(config).await?;
        }
        Commands::Export { format, output } => {
            commands::export::run(config, format, output).await?;
        }
        Commands::Wipe { yes } => {
            commands::wipe::run(config, yes).await?;
        }
        Commands::Renew => {
            commands::renew::run(config).await?;
        }
    }

    Ok(())
}

/// Environment wins over the config file.
fn apply_env_overrides(config: &mut AppConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("TOR_SOCKS") {
        config.tor.socks_proxy = v;
    }
    if let Some(v) = var("TOR_CONTROL") {
        config.tor.control_addr = v;
    }
    if let Some(v) = var("TOR_CONTROL_PASSWORD") {
        config.tor.control_password = v;
    }
    if let Some(v) = var("CRAWL_WORKERS") {
        match v.parse::<usize>().ok().filter(|&n| n > 0 && n <= 64) {
            Some(n) => config.crawl.workers = n,
            None => warn!(value = %v, "ignoring CRAWL_WORKERS, expected 1-64"),
        }
    }
    if let Some(v) = var("DATA_DB") {
        config.storage.database_path = v;
    }
    if let Some(v) = var("DATA_KEY") {
        config.storage.key_path = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_embedded_default_config_parses() {
        let config: AppConfig = toml::from_str(include_str!("../config/default.toml")).unwrap();
        assert_eq!(config.tor.socks_proxy, "127.0.0.1:9050");
        assert_eq!(config.crawl.max_links_per_page, 20);
        assert_eq!(config.storage.domains_per_scan, 10);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TOR_SOCKS", "tor:9150"),
            ("TOR_CONTROL_PASSWORD", "hunter2"),
            ("CRAWL_WORKERS", "4"),
            ("DATA_DB", "/tmp/x.db"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();

        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.tor.socks_proxy, "tor:9150");
        assert_eq!(config.tor.control_addr, "127.0.0.1:9051");
        assert_eq!(config.tor.control_password, "hunter2");
        assert_eq!(config.crawl.workers, 4);
        assert_eq!(config.storage.database_path, "/tmp/x.db");
    }

    #[test]
    fn test_bad_worker_count_is_ignored() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |k| (k == "CRAWL_WORKERS").then(|| "0".to_string()));
        assert_eq!(config.crawl.workers, 1);
    }
}
