//! Shared application state and the session-linking seam for the worker.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use vidgate_core::{AppError, AssetRepository, Config};
use vidgate_transcode::SessionTracker;
use vidgate_upload::{SessionStore, UploadManager};

/// Injected into every handler via axum state.
pub struct AppState {
    pub manager: Arc<UploadManager>,
    pub sessions: Arc<dyn SessionStore>,
    pub assets: Arc<dyn AssetRepository>,
    pub config: Arc<Config>,
}

/// Bridges the transcode worker back to the session store so a finished job
/// can record its asset id on the originating session, when that session is
/// still around.
pub struct SessionLinkTracker {
    sessions: Arc<dyn SessionStore>,
}

impl SessionLinkTracker {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl SessionTracker for SessionLinkTracker {
    async fn link_asset(&self, upload_id: Uuid, asset_id: Uuid) -> Result<(), AppError> {
        self.sessions.link_asset(upload_id, asset_id).await
    }
}
