use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Ready,
    ProcessingFailed,
}

impl Display for AssetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AssetStatus::Ready => write!(f, "ready"),
            AssetStatus::ProcessingFailed => write!(f, "processing_failed"),
        }
    }
}

/// One transcoded output at a specific resolution/bitrate profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct AssetVariant {
    pub width: u32,
    pub height: u32,
    /// Video bitrate in kbps.
    pub bitrate: u32,
    pub storage_key: String,
}

/// Durable, hash-keyed record of a finished asset.
///
/// The content hash is the dedup/idempotency key: at most one non-deleted
/// asset exists per hash. Assets are only ever soft-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub content_hash: String,
    pub storage_key: String,
    pub content_type: String,
    pub status: AssetStatus,
    /// Profile name -> produced rendition.
    pub variants: HashMap<String, AssetVariant>,
    pub thumbnail_key: Option<String>,
    pub manifest_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Asset {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
