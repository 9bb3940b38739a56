//! Asset repository
//!
//! Hash-keyed persistence seam for finished assets. The repository contract
//! is upsert-on-conflict by content hash: two concurrent writers for the same
//! content converge on one record regardless of ordering. The in-memory
//! implementation serves single-process deployments and tests; a database
//! backed implementation slots in behind the same trait.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Asset, AssetStatus, AssetVariant};

/// Fields written on an upsert. Identity fields (`id`, `created_at`) are
/// preserved when a record for the hash already exists.
#[derive(Debug, Clone)]
pub struct AssetUpsert {
    pub owner_id: Uuid,
    pub content_hash: String,
    pub storage_key: String,
    pub content_type: String,
    pub status: AssetStatus,
    pub variants: HashMap<String, AssetVariant>,
    pub thumbnail_key: Option<String>,
    pub manifest_key: Option<String>,
}

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Asset>, AppError>;

    /// Look up the non-deleted asset for a content hash, if any.
    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Asset>, AppError>;

    /// Insert a new asset for the hash, or update the existing record in
    /// place. Never produces a second record for the same hash.
    async fn upsert_by_hash(&self, upsert: AssetUpsert) -> Result<Asset, AppError>;

    /// Soft delete: the record stays but is excluded from hash lookups.
    async fn soft_delete(&self, id: Uuid) -> Result<(), AppError>;
}

/// In-process asset repository. A single lock guards the map so an upsert is
/// one atomic check-and-write, not a read-then-write race.
#[derive(Clone, Default)]
pub struct InMemoryAssetRepository {
    by_id: Arc<Mutex<HashMap<Uuid, Asset>>>,
}

impl InMemoryAssetRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetRepository for InMemoryAssetRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Asset>, AppError> {
        Ok(self.by_id.lock().await.get(&id).cloned())
    }

    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Asset>, AppError> {
        let assets = self.by_id.lock().await;
        Ok(assets
            .values()
            .find(|a| a.content_hash == content_hash && !a.is_deleted())
            .cloned())
    }

    async fn upsert_by_hash(&self, upsert: AssetUpsert) -> Result<Asset, AppError> {
        let mut assets = self.by_id.lock().await;

        let existing_id = assets
            .values()
            .find(|a| a.content_hash == upsert.content_hash && !a.is_deleted())
            .map(|a| a.id);

        let asset = match existing_id {
            Some(id) => {
                let asset = assets
                    .get_mut(&id)
                    .ok_or_else(|| AppError::Internal("asset index out of sync".into()))?;
                asset.storage_key = upsert.storage_key;
                asset.content_type = upsert.content_type;
                asset.status = upsert.status;
                asset.variants = upsert.variants;
                asset.thumbnail_key = upsert.thumbnail_key;
                asset.manifest_key = upsert.manifest_key;
                asset.clone()
            }
            None => {
                let asset = Asset {
                    id: Uuid::new_v4(),
                    owner_id: upsert.owner_id,
                    content_hash: upsert.content_hash,
                    storage_key: upsert.storage_key,
                    content_type: upsert.content_type,
                    status: upsert.status,
                    variants: upsert.variants,
                    thumbnail_key: upsert.thumbnail_key,
                    manifest_key: upsert.manifest_key,
                    created_at: Utc::now(),
                    deleted_at: None,
                };
                assets.insert(asset.id, asset.clone());
                asset
            }
        };
        Ok(asset)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut assets = self.by_id.lock().await;
        let asset = assets
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Asset not found: {}", id)))?;
        asset.deleted_at = Some(Utc::now());
        Ok(())
    }
}
