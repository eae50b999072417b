use std::path::PathBuf;

use anyhow::Result;
use tracing::warn;

use darkgather_core::config::AppConfig;
use darkgather_storage::{DataStore, ExportError, ExportFormat};

pub async fn run(config: AppConfig, format: ExportFormat, output: PathBuf) -> Result<()> {
    let store = DataStore::open(&config.storage).await?;

    match store.export(format, &output).await {
        Ok(n) => println!("Exported {} records to {}", n, output.display()),
        Err(ExportError::Empty) => {
            warn!(format = %format, "no records to export");
            println!("Nothing to export");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
