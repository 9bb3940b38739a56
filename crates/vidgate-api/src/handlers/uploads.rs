//! Upload session endpoints: init, chunk receipt, status polling.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use vidgate_core::models::SessionStatus;
use vidgate_upload::InitUpload;

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

/// Request to create an upload session.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadRequest {
    /// Original filename.
    pub filename: String,
    /// Total file size in bytes.
    pub file_size: u64,
    /// Content type (MIME type).
    pub file_type: String,
    /// Optional custom metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Optional client-computed SHA-256 hex digest for end-to-end
    /// verification.
    pub expected_hash: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadResponse {
    pub upload_id: Uuid,
    /// Chunk size in bytes the client must use.
    pub chunk_size: u64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ChunkQuery {
    /// Client's view of the chunk count; must match the session's.
    pub total_chunks: u32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadResponse {
    pub upload_id: Uuid,
    pub chunk_number: u32,
    /// Distinct chunks received so far.
    pub received: u32,
    pub total: u32,
}

/// Session snapshot for status polling.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusResponse {
    pub upload_id: Uuid,
    pub status: SessionStatus,
    /// Upload progress, 0-100.
    pub progress: f64,
    pub received_chunks: u32,
    pub total_chunks: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Owner attribution seam. Authentication middleware is external to this
/// service; when present it injects the caller's identity in this header.
fn owner_id(headers: &HeaderMap) -> Uuid {
    headers
        .get("x-owner-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .unwrap_or(Uuid::nil())
}

/// Create an upload session
#[utoipa::path(
    post,
    path = "/api/v0/uploads",
    tag = "uploads",
    request_body = InitUploadRequest,
    responses(
        (status = 201, description = "Upload session created", body = InitUploadResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 413, description = "Declared size over the limit", body = ErrorResponse)
    )
)]
pub async fn init_upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<InitUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let receipt = state
        .manager
        .init(
            owner_id(&headers),
            InitUpload {
                filename: request.filename,
                file_size: request.file_size,
                content_type: request.file_type,
                metadata: request.metadata,
                expected_hash: request.expected_hash,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InitUploadResponse {
            upload_id: receipt.upload_id,
            chunk_size: receipt.chunk_size,
            expires_at: receipt.expires_at,
        }),
    ))
}

/// Upload one chunk (raw bytes body)
#[utoipa::path(
    put,
    path = "/api/v0/uploads/{upload_id}/chunks/{chunk_number}",
    tag = "uploads",
    params(
        ("upload_id" = Uuid, Path, description = "Upload session id"),
        ("chunk_number" = u32, Path, description = "0-based chunk index"),
        ChunkQuery
    ),
    request_body(content = [u8], content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Chunk received", body = ChunkUploadResponse),
        (status = 400, description = "Invalid chunk request", body = ErrorResponse),
        (status = 404, description = "Session unknown or expired", body = ErrorResponse)
    )
)]
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    Path((upload_id, chunk_number)): Path<(Uuid, u32)>,
    Query(query): Query<ChunkQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let progress = state
        .manager
        .receive_chunk(upload_id, chunk_number, query.total_chunks, body)
        .await?;

    Ok(Json(ChunkUploadResponse {
        upload_id: progress.upload_id,
        chunk_number: progress.chunk_number,
        received: progress.received,
        total: progress.total,
    }))
}

/// Poll an upload session's status
#[utoipa::path(
    get,
    path = "/api/v0/uploads/{upload_id}",
    tag = "uploads",
    params(("upload_id" = Uuid, Path, description = "Upload session id")),
    responses(
        (status = 200, description = "Session snapshot", body = UploadStatusResponse),
        (status = 404, description = "Session unknown or expired", body = ErrorResponse)
    )
)]
pub async fn get_upload_status(
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let session = state.manager.get_status(upload_id).await?;

    Ok(Json(UploadStatusResponse {
        upload_id: session.id,
        status: session.status,
        progress: session.progress_percent(),
        received_chunks: session.received_chunks,
        total_chunks: session.total_chunks,
        content_hash: session.content_hash,
        asset_id: session.asset_id,
        error: session.error,
        expires_at: session.expires_at,
    }))
}
