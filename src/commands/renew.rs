use anyhow::Result;

use darkgather_core::config::AppConfig;
use darkgather_core::CircuitControl;
use darkgather_networks::TorGateway;

pub async fn run(config: AppConfig) -> Result<()> {
    let gateway = TorGateway::new(&config.tor)?;
    gateway.rotate_identity().await?;
    println!("New Tor circuit requested via {}", config.tor.control_addr);
    Ok(())
}
