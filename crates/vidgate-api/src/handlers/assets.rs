//! Asset read surface.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use vidgate_core::models::AssetStatus;
use vidgate_core::AppError;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetVariantResponse {
    pub profile: String,
    pub width: u32,
    pub height: u32,
    /// Video bitrate in kbps.
    pub bitrate: u32,
    pub key: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetResponse {
    pub id: Uuid,
    pub status: AssetStatus,
    pub variants: Vec<AssetVariantResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fetch a finished asset
#[utoipa::path(
    get,
    path = "/api/v0/assets/{asset_id}",
    tag = "assets",
    params(("asset_id" = Uuid, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Asset", body = AssetResponse),
        (status = 404, description = "Unknown or deleted asset", body = ErrorResponse)
    )
)]
pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let asset = state
        .assets
        .get(asset_id)
        .await?
        .filter(|asset| !asset.is_deleted())
        .ok_or_else(|| AppError::NotFound(format!("Asset not found: {}", asset_id)))?;

    let mut variants: Vec<AssetVariantResponse> = asset
        .variants
        .into_iter()
        .map(|(profile, variant)| AssetVariantResponse {
            profile,
            width: variant.width,
            height: variant.height,
            bitrate: variant.bitrate,
            key: variant.storage_key,
        })
        .collect();
    variants.sort_by(|a, b| b.bitrate.cmp(&a.bitrate).then_with(|| a.profile.cmp(&b.profile)));

    Ok(Json(AssetResponse {
        id: asset.id,
        status: asset.status,
        variants,
        thumbnail_key: asset.thumbnail_key,
        manifest_key: asset.manifest_key,
        created_at: asset.created_at,
    }))
}
