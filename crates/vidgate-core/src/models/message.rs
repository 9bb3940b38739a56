use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Durable handoff contract between upload completion and the transcode
/// consumer. Delivery is at-least-once: consumers must key idempotency off
/// `content_hash`, never off message identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub upload_id: Uuid,
    pub owner_id: Uuid,
    pub storage_key: String,
    pub storage_bucket: Option<String>,
    pub file_type: String,
    pub metadata: HashMap<String, String>,
    pub content_hash: String,
    pub timestamp: DateTime<Utc>,
}

impl ProcessingMessage {
    pub const TYPE_NEW_UPLOAD: &'static str = "new_upload";

    #[allow(clippy::too_many_arguments)]
    pub fn new_upload(
        upload_id: Uuid,
        owner_id: Uuid,
        storage_key: String,
        storage_bucket: Option<String>,
        file_type: String,
        metadata: HashMap<String, String>,
        content_hash: String,
    ) -> Self {
        Self {
            message_type: Self::TYPE_NEW_UPLOAD.to_string(),
            upload_id,
            owner_id,
            storage_key,
            storage_bucket,
            file_type,
            metadata,
            content_hash,
            timestamp: Utc::now(),
        }
    }
}
