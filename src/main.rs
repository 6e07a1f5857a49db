use anyhow::Context;

use media_downloader_lib::{config::AppConfig, logging::setup_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    setup_logging(config.log_level)?;

    media_downloader_lib::run(config).await
}
