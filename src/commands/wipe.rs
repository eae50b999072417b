use anyhow::Result;

use darkgather_core::config::AppConfig;
use darkgather_storage::DataStore;

pub async fn run(config: AppConfig, yes: bool) -> Result<()> {
    if !yes {
        println!(
            "This destroys {} and {} for good. Re-run with --yes to proceed.",
            config.storage.database_path, config.storage.key_path
        );
        return Ok(());
    }

    let store = DataStore::open(&config.storage).await?;
    store.wipe().await?;
    println!("All collected data wiped");
    Ok(())
}
