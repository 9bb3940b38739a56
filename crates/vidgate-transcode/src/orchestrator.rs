//! Transcode orchestration: pull a handoff message, fetch the source once,
//! fan out bounded per-profile transcodes, thumbnail, manifest, asset upsert.

use futures::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use vidgate_core::models::{AssetStatus, AssetVariant, ProcessingMessage};
use vidgate_core::retry::retry_bounded;
use vidgate_core::{AppError, AssetRepository, AssetUpsert, TranscodeProfile};
use vidgate_queue::{Delivery, HandoffQueue};
use vidgate_storage::{keys, Storage};

use crate::ffmpeg::Transcoder;
use crate::manifest;

/// Delay before polling again after the queue itself errors.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Global cap on concurrent codec invocations, across all jobs.
    pub max_concurrent_transcodes: usize,
    pub thumbnail_width: u32,
    pub fetch_retry_attempts: u32,
    pub fetch_retry_base_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transcodes: 2,
            thumbnail_width: 640,
            fetch_retry_attempts: 3,
            fetch_retry_base_ms: 500,
        }
    }
}

/// Callback into the ingestion side so a still-tracked session can learn
/// which asset its upload became. Sessions expire independently of
/// processing, so failures here are expected and non-fatal.
#[async_trait::async_trait]
pub trait SessionTracker: Send + Sync {
    async fn link_asset(&self, upload_id: Uuid, asset_id: Uuid) -> Result<(), AppError>;
}

/// Frame offset for the thumbnail: a tenth of the way in, clamped to the
/// 3s..30s window, pulled back to the midpoint for very short sources.
pub fn thumbnail_offset(duration_secs: f64) -> f64 {
    let offset = (duration_secs * 0.1).clamp(3.0, 30.0);
    if offset >= duration_secs {
        (duration_secs / 2.0).max(0.0)
    } else {
        offset
    }
}

pub struct TranscodeOrchestrator {
    queue: Arc<dyn HandoffQueue>,
    storage: Arc<dyn Storage>,
    assets: Arc<dyn AssetRepository>,
    transcoder: Arc<dyn Transcoder>,
    profiles: Arc<Vec<TranscodeProfile>>,
    limiter: Arc<Semaphore>,
    tracker: Option<Arc<dyn SessionTracker>>,
    config: OrchestratorConfig,
}

impl TranscodeOrchestrator {
    pub fn new(
        queue: Arc<dyn HandoffQueue>,
        storage: Arc<dyn Storage>,
        assets: Arc<dyn AssetRepository>,
        transcoder: Arc<dyn Transcoder>,
        profiles: Vec<TranscodeProfile>,
        config: OrchestratorConfig,
    ) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_transcodes.max(1)));
        Self {
            queue,
            storage,
            assets,
            transcoder,
            profiles: Arc::new(profiles),
            limiter,
            tracker: None,
            config,
        }
    }

    pub fn with_session_tracker(mut self, tracker: Arc<dyn SessionTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Consume the queue until told to stop. Each delivery is processed in
    /// its own task; the codec semaphore bounds actual transcode work, so
    /// claiming jobs eagerly never over-commits the CPU.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(
            profiles = self.profiles.len(),
            max_concurrent_transcodes = self.config.max_concurrent_transcodes,
            "Transcode orchestrator started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Transcode orchestrator shutting down");
                    break;
                }
                result = self.queue.receive() => match result {
                    Ok(delivery) => {
                        let this = self.clone();
                        tokio::spawn(async move {
                            this.handle_delivery(delivery).await;
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Queue receive failed");
                        tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                    }
                },
            }
        }
    }

    async fn handle_delivery(&self, delivery: Delivery) {
        let upload_id = delivery.message.upload_id;
        match self.process(&delivery.message).await {
            Ok(()) => {
                if let Err(e) = self.queue.ack(&delivery).await {
                    tracing::warn!(upload_id = %upload_id, error = %e, "Ack failed");
                }
            }
            Err(e) => {
                tracing::error!(
                    upload_id = %upload_id,
                    error = %e,
                    "Processing failed, returning message to queue"
                );
                if let Err(nack_err) = self.queue.nack(&delivery).await {
                    tracing::warn!(upload_id = %upload_id, error = %nack_err, "Nack failed");
                }
            }
        }
    }

    /// Process one handoff message. Idempotent under redelivery: the content
    /// hash keys both the early-skip check and the final upsert, so the same
    /// content never yields a second asset. An `Err` here means the job
    /// should be redelivered; per-profile failures are not errors.
    pub async fn process(&self, message: &ProcessingMessage) -> Result<(), AppError> {
        if let Some(existing) = self.assets.find_by_hash(&message.content_hash).await? {
            if existing.status == AssetStatus::Ready {
                tracing::info!(
                    upload_id = %message.upload_id,
                    asset_id = %existing.id,
                    content_hash = %message.content_hash,
                    "Content already processed, skipping"
                );
                self.link_session(message.upload_id, existing.id).await;
                return Ok(());
            }
        }

        let workdir = TempDir::new()?;
        let input = workdir.path().join("source");
        retry_bounded(
            self.config.fetch_retry_attempts,
            self.config.fetch_retry_base_ms,
            || self.fetch_source(&message.storage_key, &input),
        )
        .await?;

        let duration = match self.transcoder.probe_duration(&input).await {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!(upload_id = %message.upload_id, error = %e, "Probe failed");
                None
            }
        };

        let prefix = keys::asset_prefix(message.owner_id, &message.content_hash);
        let renditions_dir = workdir.path().join("renditions");
        fs::create_dir_all(&renditions_dir).await?;

        let variants = self
            .produce_renditions(&input, &renditions_dir, &prefix, message.upload_id)
            .await;

        let thumbnail_key = self
            .produce_thumbnail(&input, workdir.path(), &prefix, duration, message.upload_id)
            .await;

        let manifest_key = if variants.is_empty() {
            None
        } else {
            let playlist = manifest::build_master_playlist(&variants);
            let key = keys::manifest_key(&prefix);
            match self
                .storage
                .upload_with_key(&key, playlist.into_bytes(), manifest::MANIFEST_CONTENT_TYPE)
                .await
            {
                Ok(()) => Some(key),
                Err(e) => {
                    tracing::warn!(upload_id = %message.upload_id, error = %e, "Manifest upload failed");
                    None
                }
            }
        };

        let status = if variants.is_empty() {
            AssetStatus::ProcessingFailed
        } else {
            AssetStatus::Ready
        };

        let asset = self
            .assets
            .upsert_by_hash(AssetUpsert {
                owner_id: message.owner_id,
                content_hash: message.content_hash.clone(),
                storage_key: message.storage_key.clone(),
                content_type: message.file_type.clone(),
                status,
                variants,
                thumbnail_key,
                manifest_key,
            })
            .await?;

        tracing::info!(
            upload_id = %message.upload_id,
            asset_id = %asset.id,
            status = %asset.status,
            variants = asset.variants.len(),
            "Processing finished"
        );
        self.link_session(message.upload_id, asset.id).await;
        Ok(())
    }

    /// Run every configured profile against the source, bounded by the
    /// shared codec semaphore. One profile's failure never aborts siblings;
    /// only successfully transcoded and uploaded renditions are returned.
    async fn produce_renditions(
        &self,
        input: &Path,
        renditions_dir: &Path,
        prefix: &str,
        upload_id: Uuid,
    ) -> HashMap<String, AssetVariant> {
        let mut handles = Vec::with_capacity(self.profiles.len());
        for profile in self.profiles.iter().cloned() {
            let transcoder = self.transcoder.clone();
            let limiter = self.limiter.clone();
            let input = input.to_path_buf();
            let output = renditions_dir.join(format!("{}.mp4", profile.name));

            handles.push(tokio::spawn(async move {
                let _permit = match limiter.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            profile,
                            output,
                            Err(AppError::Internal("Codec limiter closed".into())),
                        );
                    }
                };
                let result = transcoder.transcode(&input, &output, &profile).await;
                (profile, output, result)
            }));
        }

        let mut variants = HashMap::new();
        for handle in handles {
            match handle.await {
                Ok((profile, output, Ok(()))) => {
                    let key = keys::rendition_key(prefix, &profile.name);
                    match self.upload_rendition(&output, &key).await {
                        Ok(()) => {
                            variants.insert(
                                profile.name.clone(),
                                AssetVariant {
                                    width: profile.width,
                                    height: profile.height,
                                    bitrate: profile.video_bitrate,
                                    storage_key: key,
                                },
                            );
                        }
                        Err(e) => {
                            tracing::warn!(
                                upload_id = %upload_id,
                                profile = %profile.name,
                                error = %e,
                                "Rendition upload failed"
                            );
                        }
                    }
                }
                Ok((profile, _, Err(e))) => {
                    tracing::warn!(
                        upload_id = %upload_id,
                        profile = %profile.name,
                        error = %e,
                        "Rendition transcode failed"
                    );
                }
                Err(e) => {
                    tracing::warn!(upload_id = %upload_id, error = %e, "Rendition task panicked");
                }
            }
        }
        variants
    }

    /// Thumbnail extraction is best-effort: any failure is reported and the
    /// job continues without one.
    async fn produce_thumbnail(
        &self,
        input: &Path,
        workdir: &Path,
        prefix: &str,
        duration: Option<f64>,
        upload_id: Uuid,
    ) -> Option<String> {
        let duration = duration?;
        let offset = thumbnail_offset(duration);
        let frame_path = workdir.join("thumbnail.jpg");

        if let Err(e) = self
            .transcoder
            .extract_frame(input, &frame_path, offset, self.config.thumbnail_width)
            .await
        {
            tracing::warn!(upload_id = %upload_id, error = %e, "Thumbnail extraction failed");
            return None;
        }

        let bytes = match fs::read(&frame_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(upload_id = %upload_id, error = %e, "Thumbnail read failed");
                return None;
            }
        };

        let key = keys::thumbnail_key(prefix);
        match self.storage.upload_with_key(&key, bytes, "image/jpeg").await {
            Ok(()) => Some(key),
            Err(e) => {
                tracing::warn!(upload_id = %upload_id, error = %e, "Thumbnail upload failed");
                None
            }
        }
    }

    async fn fetch_source(&self, storage_key: &str, dest: &Path) -> Result<(), AppError> {
        let mut stream = self.storage.download_stream(storage_key).await?;
        let file = fs::File::create(dest).await?;
        let mut writer = BufWriter::new(file);
        while let Some(chunk) = stream.next().await {
            writer.write_all(&chunk?).await?;
        }
        writer.flush().await?;
        Ok(())
    }

    async fn upload_rendition(&self, path: &Path, key: &str) -> Result<(), AppError> {
        let file = fs::File::open(path).await?;
        let reader: Pin<Box<dyn AsyncRead + Send + Unpin>> = Box::pin(file);
        self.storage
            .upload_stream_with_key(key, "video/mp4", reader)
            .await?;
        Ok(())
    }

    async fn link_session(&self, upload_id: Uuid, asset_id: Uuid) {
        if let Some(ref tracker) = self.tracker {
            if let Err(e) = tracker.link_asset(upload_id, asset_id).await {
                // Expected when the session has expired or restarted away.
                tracing::debug!(
                    upload_id = %upload_id,
                    asset_id = %asset_id,
                    error = %e,
                    "Session no longer tracked"
                );
            }
        }
    }
}
