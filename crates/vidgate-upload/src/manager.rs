//! Upload manager: the session state machine and the post-upload pipeline.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncRead;
use uuid::Uuid;

use vidgate_core::error::AppError;
use vidgate_core::models::{ProcessingMessage, SessionStatus, UploadSession};
use vidgate_core::validation::validate_metadata;
use vidgate_core::{AssetRepository, Config};
use vidgate_queue::HandoffQueue;
use vidgate_storage::{keys, Storage};

use crate::assembler;
use crate::integrity;
use crate::session_store::{ChunkReceipt, SessionStore};

/// Validated init request.
#[derive(Debug, Clone)]
pub struct InitUpload {
    pub filename: String,
    pub file_size: u64,
    pub content_type: String,
    pub metadata: std::collections::HashMap<String, String>,
    pub expected_hash: Option<String>,
}

/// What the client needs to start sending chunks.
#[derive(Debug, Clone)]
pub struct InitReceipt {
    pub upload_id: Uuid,
    pub chunk_size: u64,
    pub expires_at: DateTime<Utc>,
}

/// Progress snapshot returned from a chunk receipt.
#[derive(Debug, Clone)]
pub struct ChunkProgress {
    pub upload_id: Uuid,
    pub chunk_number: u32,
    pub received: u32,
    pub total: u32,
}

/// Coordinates chunk ingestion and the finalize pipeline for all sessions.
///
/// All collaborators are long-lived injected handles. Chunk ingestion for
/// unrelated sessions proceeds in parallel; assembly runs as a spawned task
/// per session so one session's assembly never blocks another's chunks.
pub struct UploadManager {
    sessions: Arc<dyn SessionStore>,
    assets: Arc<dyn AssetRepository>,
    storage: Arc<dyn Storage>,
    queue: Arc<dyn HandoffQueue>,
    staging_root: PathBuf,
    config: Arc<Config>,
}

impl UploadManager {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        assets: Arc<dyn AssetRepository>,
        storage: Arc<dyn Storage>,
        queue: Arc<dyn HandoffQueue>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            sessions,
            assets,
            storage,
            queue,
            staging_root: PathBuf::from(&config.staging_dir),
            config,
        }
    }

    fn staging_dir(&self, upload_id: Uuid) -> PathBuf {
        self.staging_root.join(upload_id.to_string())
    }

    /// Create a new upload session. Rejects synchronously on policy
    /// violations; no session is created on error.
    #[tracing::instrument(skip(self, request), fields(filename = %request.filename))]
    pub async fn init(&self, owner_id: Uuid, request: InitUpload) -> Result<InitReceipt, AppError> {
        if request.filename.trim().is_empty() {
            return Err(AppError::Validation("filename is required".into()));
        }
        if request.content_type.trim().is_empty() {
            return Err(AppError::Validation("fileType is required".into()));
        }
        if request.file_size == 0 {
            return Err(AppError::Validation(
                "fileSize must be greater than 0".into(),
            ));
        }
        if request.file_size > self.config.max_file_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File size {} exceeds maximum allowed {} bytes",
                request.file_size, self.config.max_file_size
            )));
        }
        if !self.config.is_content_type_allowed(&request.content_type) {
            return Err(AppError::Validation(format!(
                "File type not allowed: {}",
                request.content_type
            )));
        }
        validate_metadata(&request.metadata)?;
        if let Some(ref expected) = request.expected_hash {
            let is_sha256_hex =
                expected.len() == 64 && expected.chars().all(|c| c.is_ascii_hexdigit());
            if !is_sha256_hex {
                return Err(AppError::Validation(
                    "expectedHash must be a 64-character hex SHA-256 digest".into(),
                ));
            }
        }

        let session = UploadSession::new(
            owner_id,
            request.filename,
            request.file_size,
            request.content_type,
            request.metadata,
            self.config.chunk_size,
            request.expected_hash,
            self.config.session_ttl_secs,
        );
        let receipt = InitReceipt {
            upload_id: session.id,
            chunk_size: session.chunk_size,
            expires_at: session.expires_at,
        };

        tracing::info!(
            session_id = %session.id,
            owner_id = %owner_id,
            file_size = session.file_size,
            total_chunks = session.total_chunks,
            "Upload session initialized"
        );
        self.sessions.create(session).await?;
        Ok(receipt)
    }

    /// Receive one chunk. Idempotent: a retried index returns the current
    /// progress unchanged. The call that completes the chunk set triggers
    /// assembly as an independent unit of work; its failure is captured into
    /// session status, not surfaced here.
    pub async fn receive_chunk(
        &self,
        upload_id: Uuid,
        chunk_number: u32,
        declared_total: u32,
        data: Bytes,
    ) -> Result<ChunkProgress, AppError> {
        let session = self
            .sessions
            .get(upload_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload session not found: {}", upload_id)))?;

        if declared_total != session.total_chunks {
            return Err(AppError::Validation(format!(
                "totalChunks mismatch: session expects {}, request declared {}",
                session.total_chunks, declared_total
            )));
        }
        if chunk_number >= session.total_chunks {
            return Err(AppError::Validation(format!(
                "Chunk index {} out of range for {} chunks",
                chunk_number, session.total_chunks
            )));
        }
        if data.is_empty() {
            return Err(AppError::Validation("Chunk body is empty".into()));
        }
        if data.len() as u64 > session.chunk_size {
            return Err(AppError::Validation(format!(
                "Chunk of {} bytes exceeds chunk size {}",
                data.len(),
                session.chunk_size
            )));
        }

        // Past the uploading phase every retry is a pure progress read; do
        // not touch staging while assembly may be consuming it.
        if !matches!(
            session.status,
            SessionStatus::Initialized | SessionStatus::Uploading
        ) {
            return Ok(ChunkProgress {
                upload_id,
                chunk_number,
                received: session.received_chunks,
                total: session.total_chunks,
            });
        }

        self.stage_chunk(upload_id, chunk_number, &data).await?;

        let receipt = self
            .sessions
            .mark_chunk_received(upload_id, chunk_number)
            .await?;

        match receipt {
            ChunkReceipt::Accepted { complete: true, .. } => {
                self.spawn_finalize(upload_id);
            }
            ChunkReceipt::AlreadyReceived { .. } => {
                // The status snapshot above predates stage_chunk, so a slow
                // duplicate can re-stage its file after finalize already swept
                // the staging directory. Re-check and undo the write if the
                // session has moved past the uploading phase.
                self.discard_stale_chunk(upload_id, chunk_number).await;
            }
            ChunkReceipt::Accepted { .. } => {}
        }

        Ok(ChunkProgress {
            upload_id,
            chunk_number,
            received: receipt.received(),
            total: session.total_chunks,
        })
    }

    /// Session snapshot for status polling.
    pub async fn get_status(&self, upload_id: Uuid) -> Result<UploadSession, AppError> {
        self.sessions
            .get(upload_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload session not found: {}", upload_id)))
    }

    /// Remove a duplicate chunk file staged after the finalize pipeline has
    /// already swept the staging directory, so a raced retry never leaves an
    /// orphan behind a finished session. Mid-pipeline statuses are left
    /// alone: assembly may still need the file, and the pipeline's own
    /// cleanup sweeps the whole directory on every exit path.
    async fn discard_stale_chunk(&self, upload_id: Uuid, chunk_number: u32) {
        let swept = match self.sessions.get(upload_id).await {
            Ok(Some(session)) => matches!(
                session.status,
                SessionStatus::Complete | SessionStatus::HandedOff | SessionStatus::Failed
            ),
            Ok(None) => true,
            Err(_) => false,
        };
        if !swept {
            return;
        }

        let staging = self.staging_dir(upload_id);
        let _ = fs::remove_file(assembler::chunk_path(&staging, chunk_number)).await;
        // Fails while the directory still holds other files; that is fine.
        let _ = fs::remove_dir(&staging).await;
    }

    /// Write chunk bytes into staging. Temp file + rename, so a concurrent
    /// duplicate of the same index can never leave a torn file behind.
    async fn stage_chunk(
        &self,
        upload_id: Uuid,
        chunk_number: u32,
        data: &[u8],
    ) -> Result<(), AppError> {
        let staging = self.staging_dir(upload_id);
        fs::create_dir_all(&staging).await?;

        let final_path = assembler::chunk_path(&staging, chunk_number);
        let tmp_path = staging.join(format!(".tmp-{}-{}", chunk_number, Uuid::new_v4()));
        fs::write(&tmp_path, data).await?;
        fs::rename(&tmp_path, &final_path).await?;
        Ok(())
    }

    /// Run the finalize pipeline in its own task. Failure lands in session
    /// status; staging is cleaned up best-effort on any failure.
    fn spawn_finalize(&self, upload_id: Uuid) {
        let sessions = self.sessions.clone();
        let assets = self.assets.clone();
        let storage = self.storage.clone();
        let queue = self.queue.clone();
        let config = self.config.clone();
        let staging = self.staging_dir(upload_id);

        tokio::spawn(async move {
            let result = finalize(
                upload_id,
                &staging,
                sessions.as_ref(),
                assets.as_ref(),
                storage.as_ref(),
                queue.as_ref(),
                &config,
            )
            .await;

            if let Err(e) = result {
                tracing::error!(session_id = %upload_id, error = %e, "Upload finalize failed");
                if let Err(store_err) = sessions.set_failed(upload_id, e.to_string()).await {
                    tracing::warn!(
                        session_id = %upload_id,
                        error = %store_err,
                        "Could not record finalize failure"
                    );
                }
                assembler::cleanup_staging(&staging).await;
            }
        });
    }
}

/// Assembly → size check → hash → dedup → store → publish.
#[tracing::instrument(skip_all, fields(session_id = %upload_id))]
async fn finalize(
    upload_id: Uuid,
    staging: &std::path::Path,
    sessions: &dyn SessionStore,
    assets: &dyn AssetRepository,
    storage: &dyn Storage,
    queue: &dyn HandoffQueue,
    config: &Config,
) -> Result<(), AppError> {
    let session = sessions
        .get(upload_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Upload session not found: {}", upload_id)))?;

    let assembled = assembler::assembled_path(staging);
    let actual_size = assembler::assemble(staging, session.total_chunks, &assembled).await?;

    sessions
        .update_status(upload_id, SessionStatus::Validating)
        .await?;
    integrity::verify_size(session.file_size, actual_size)?;

    sessions
        .update_status(upload_id, SessionStatus::Hashing)
        .await?;
    let content_hash = integrity::sha256_file(&assembled).await?;
    integrity::verify_expected_hash(session.expected_hash.as_deref(), &content_hash)?;
    sessions
        .set_content_hash(upload_id, content_hash.clone())
        .await?;

    if config.dedup_enabled {
        if let Some(existing) = assets.find_by_hash(&content_hash).await? {
            tracing::info!(
                session_id = %upload_id,
                asset_id = %existing.id,
                content_hash = %content_hash,
                "Duplicate content, linking existing asset"
            );
            sessions
                .update_status(upload_id, SessionStatus::Duplicate)
                .await?;
            sessions.link_asset(upload_id, existing.id).await?;
            sessions
                .update_status(upload_id, SessionStatus::Complete)
                .await?;
            assembler::cleanup_staging(staging).await;
            return Ok(());
        }
    }

    sessions
        .update_status(upload_id, SessionStatus::UploadingToStore)
        .await?;
    let storage_key = keys::source_key(session.owner_id, &content_hash, &session.filename);
    let file = fs::File::open(&assembled).await?;
    let reader: Pin<Box<dyn AsyncRead + Send + Unpin>> = Box::pin(file);
    storage
        .upload_stream_with_key(&storage_key, &session.content_type, reader)
        .await?;

    sessions
        .update_status(upload_id, SessionStatus::Complete)
        .await?;
    tracing::info!(
        session_id = %upload_id,
        storage_key = %storage_key,
        content_hash = %content_hash,
        size_bytes = actual_size,
        "Upload stored"
    );

    let message = ProcessingMessage::new_upload(
        upload_id,
        session.owner_id,
        storage_key,
        config.storage_bucket.clone(),
        session.content_type.clone(),
        session.metadata.clone(),
        content_hash,
    );
    match queue.publish(&message).await {
        Ok(()) => {
            sessions
                .update_status(upload_id, SessionStatus::HandedOff)
                .await?;
            assembler::cleanup_staging(staging).await;
        }
        Err(e) => {
            // Bytes are safely stored; the session stays complete with a
            // handoff gap. No automatic republish exists for this case.
            tracing::error!(
                session_id = %upload_id,
                error = %e,
                "Handoff publish failed; session remains complete without handoff"
            );
            assembler::cleanup_staging(staging).await;
        }
    }

    Ok(())
}
