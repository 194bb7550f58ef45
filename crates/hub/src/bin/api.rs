use anyhow::Result;

use smartpot_hub::config::HubConfig;

#[tokio::main]
async fn main() -> Result<()> {
    smartpot_hub::init_tracing();

    let cfg = HubConfig::from_env()?;
    tracing::info!(
        mock = cfg.api.mock_mode,
        data_dir = %cfg.storage.data_dir.display(),
        "smartpot api starting"
    );

    smartpot_hub::web::serve(&cfg).await
}
