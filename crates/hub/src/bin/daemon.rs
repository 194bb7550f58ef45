use anyhow::Result;

use smartpot_hub::config::HubConfig;
use smartpot_hub::daemon::Daemon;

#[tokio::main]
async fn main() -> Result<()> {
    smartpot_hub::init_tracing();

    let cfg = HubConfig::from_env()?;
    tracing::info!(
        port = %cfg.serial.port,
        baud = cfg.serial.baud_rate,
        data_dir = %cfg.storage.data_dir.display(),
        "smartpot daemon starting"
    );

    Daemon::new(cfg).run().await
}
