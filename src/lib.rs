pub mod api;
pub mod config;
pub mod downloader;
pub mod logging;

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};

use api::AppState;
use config::AppConfig;
use downloader::backends::YtDlpBackend;
use downloader::extractors::{CliInfoExtractor, ExtractorConfig};
use downloader::storage::purge_stale;
use downloader::Downloader;

/// Wire the yt-dlp extractor and backend from configuration
pub fn build_downloader(config: &AppConfig) -> Downloader {
    let extractor = CliInfoExtractor::discover(config.ytdlp_path.as_deref());
    let backend = YtDlpBackend::discover(config.ytdlp_path.as_deref(), config.download_timeout_secs)
        .with_proxy(config.proxy.clone())
        .with_cookies_path(config.cookies_path.clone());
    let extractor_config = ExtractorConfig::default()
        .with_proxy(config.proxy.clone())
        .with_cookies_path(config.cookies_path.clone())
        .with_timeout(config.metadata_timeout_secs);

    Downloader::new(
        Arc::new(extractor),
        Arc::new(backend),
        extractor_config,
        config.downloads_dir.clone(),
    )
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.downloads_dir)
        .await
        .with_context(|| format!("creating downloads dir {}", config.downloads_dir.display()))?;

    let purged = purge_stale(&config.downloads_dir).context("purging stale downloads")?;
    if purged > 0 {
        info!(purged, "Removed downloads left over from a previous run");
    }

    let downloader = build_downloader(&config);
    if !downloader.is_available().await {
        warn!("yt-dlp is not runnable; every request will fail until it is installed");
    }

    let app = api::router(AppState::new(downloader));
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!(
        %addr,
        downloads_dir = %config.downloads_dir.display(),
        "Media downloader listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", err);
    }
    info!("Shutting down");
}
