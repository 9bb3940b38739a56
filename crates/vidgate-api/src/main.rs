use anyhow::Context;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use vidgate_api::{build_router, AppState, SessionLinkTracker};
use vidgate_core::profiles::{default_profiles, load_profiles};
use vidgate_core::{AssetRepository, Config, InMemoryAssetRepository};
use vidgate_queue::{FileQueue, HandoffQueue};
use vidgate_storage::{LocalStorage, Storage};
use vidgate_transcode::{FfmpegTranscoder, OrchestratorConfig, TranscodeOrchestrator};
use vidgate_upload::{InMemorySessionStore, SessionStore, UploadManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(Config::from_env().context("Failed to load configuration")?);

    tokio::fs::create_dir_all(&config.staging_dir)
        .await
        .context("Failed to create staging directory")?;

    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(&config.storage_path)
            .await
            .context("Failed to initialize storage")?,
    );
    let queue: Arc<dyn HandoffQueue> = Arc::new(
        FileQueue::new(&config.queue_dir)
            .await
            .context("Failed to initialize handoff queue")?,
    );
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let assets: Arc<dyn AssetRepository> = Arc::new(InMemoryAssetRepository::new());

    let manager = Arc::new(UploadManager::new(
        sessions.clone(),
        assets.clone(),
        storage.clone(),
        queue.clone(),
        config.clone(),
    ));

    let profiles = match config.profiles_path {
        Some(ref path) => load_profiles(path).context("Failed to load transcode profiles")?,
        None => default_profiles(),
    };

    let transcoder = Arc::new(FfmpegTranscoder::new(
        config.ffmpeg_path.clone(),
        config.ffprobe_path.clone(),
    ));
    let orchestrator = Arc::new(
        TranscodeOrchestrator::new(
            queue.clone(),
            storage.clone(),
            assets.clone(),
            transcoder,
            profiles,
            OrchestratorConfig {
                max_concurrent_transcodes: config.max_concurrent_transcodes,
                thumbnail_width: config.thumbnail_width,
                ..Default::default()
            },
        )
        .with_session_tracker(Arc::new(SessionLinkTracker::new(sessions.clone()))),
    );

    let (worker_shutdown_tx, worker_shutdown_rx) = mpsc::channel(1);
    let worker = tokio::spawn(orchestrator.run(worker_shutdown_rx));

    let state = Arc::new(AppState {
        manager,
        sessions,
        assets,
        config: config.clone(),
    });
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.server_port))
        .await
        .context("Failed to bind server port")?;
    tracing::info!(port = config.server_port, "Vidgate API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let _ = worker_shutdown_tx.send(()).await;
    let _ = worker.await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
