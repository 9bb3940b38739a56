//! OpenAPI document assembled from handler annotations.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers::assets::{AssetResponse, AssetVariantResponse};
use crate::handlers::uploads::{
    ChunkUploadResponse, InitUploadRequest, InitUploadResponse, UploadStatusResponse,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vidgate API",
        description = "Chunked resumable media uploads with transcoding"
    ),
    paths(
        crate::handlers::uploads::init_upload,
        crate::handlers::uploads::upload_chunk,
        crate::handlers::uploads::get_upload_status,
        crate::handlers::assets::get_asset,
    ),
    components(schemas(
        vidgate_core::models::SessionStatus,
        vidgate_core::models::AssetStatus,
        InitUploadRequest,
        InitUploadResponse,
        ChunkUploadResponse,
        UploadStatusResponse,
        AssetResponse,
        AssetVariantResponse,
        ErrorResponse,
    ))
)]
pub struct ApiDoc;
