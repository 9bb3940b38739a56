use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of one upload attempt.
///
/// Transitions are monotonic: a session only moves forward through the
/// pipeline, except into the terminal `Failed` state, which is reachable from
/// any non-terminal state. `Duplicate` and `UploadingToStore` are the two
/// branches after hashing; both converge on `Complete`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initialized,
    Uploading,
    Assembling,
    Validating,
    Hashing,
    Duplicate,
    UploadingToStore,
    Complete,
    HandedOff,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::HandedOff | SessionStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            SessionStatus::Initialized => 0,
            SessionStatus::Uploading => 1,
            SessionStatus::Assembling => 2,
            SessionStatus::Validating => 3,
            SessionStatus::Hashing => 4,
            SessionStatus::Duplicate | SessionStatus::UploadingToStore => 5,
            SessionStatus::Complete => 6,
            SessionStatus::HandedOff => 7,
            SessionStatus::Failed => 8,
        }
    }

    /// Whether moving from `self` to `to` respects monotonic ordering.
    pub fn can_transition_to(&self, to: SessionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if to == SessionStatus::Failed {
            return true;
        }
        to.rank() > self.rank()
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            SessionStatus::Initialized => "initialized",
            SessionStatus::Uploading => "uploading",
            SessionStatus::Assembling => "assembling",
            SessionStatus::Validating => "validating",
            SessionStatus::Hashing => "hashing",
            SessionStatus::Duplicate => "duplicate",
            SessionStatus::UploadingToStore => "uploading_to_store",
            SessionStatus::Complete => "complete",
            SessionStatus::HandedOff => "handed_off",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Server-side record tracking one chunked upload attempt end-to-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub file_size: u64,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
    pub chunk_size: u64,
    pub total_chunks: u32,
    pub received_chunks: u32,
    pub status: SessionStatus,
    pub expected_hash: Option<String>,
    pub content_hash: Option<String>,
    pub asset_id: Option<Uuid>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_chunk_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl UploadSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner_id: Uuid,
        filename: String,
        file_size: u64,
        content_type: String,
        metadata: HashMap<String, String>,
        chunk_size: u64,
        expected_hash: Option<String>,
        ttl_secs: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            filename,
            file_size,
            content_type,
            metadata,
            chunk_size,
            total_chunks: file_size.div_ceil(chunk_size) as u32,
            received_chunks: 0,
            status: SessionStatus::Initialized,
            expected_hash,
            content_hash: None,
            asset_id: None,
            error: None,
            created_at: now,
            last_chunk_at: None,
            expires_at: now + Duration::seconds(ttl_secs as i64),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Upload progress as 0-100.
    pub fn progress_percent(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        (self.received_chunks as f64 / self.total_chunks as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> UploadSession {
        UploadSession::new(
            Uuid::new_v4(),
            "clip.mp4".into(),
            10_000_000,
            "video/mp4".into(),
            HashMap::new(),
            5_000_000,
            None,
            3600,
        )
    }

    #[test]
    fn chunk_count_is_ceiling_of_size_over_chunk_size() {
        let s = session();
        assert_eq!(s.total_chunks, 2);

        let odd = UploadSession::new(
            Uuid::new_v4(),
            "clip.mp4".into(),
            10_000_001,
            "video/mp4".into(),
            HashMap::new(),
            5_000_000,
            None,
            3600,
        );
        assert_eq!(odd.total_chunks, 3);
    }

    #[test]
    fn status_transitions_are_monotonic() {
        use SessionStatus::*;
        assert!(Initialized.can_transition_to(Uploading));
        assert!(Uploading.can_transition_to(Assembling));
        assert!(Hashing.can_transition_to(Duplicate));
        assert!(Hashing.can_transition_to(UploadingToStore));
        assert!(Duplicate.can_transition_to(Complete));
        assert!(Complete.can_transition_to(HandedOff));

        // Never revert
        assert!(!Assembling.can_transition_to(Uploading));
        assert!(!Complete.can_transition_to(Hashing));
        // Terminal states stay terminal
        assert!(!HandedOff.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Uploading));
        // Failed reachable from any non-terminal state
        assert!(Initialized.can_transition_to(Failed));
        assert!(UploadingToStore.can_transition_to(Failed));
    }

    #[test]
    fn progress_reflects_received_chunks() {
        let mut s = session();
        assert_eq!(s.progress_percent(), 0.0);
        s.received_chunks = 1;
        assert_eq!(s.progress_percent(), 50.0);
        s.received_chunks = 2;
        assert_eq!(s.progress_percent(), 100.0);
    }

    #[test]
    fn session_expires_after_ttl() {
        let s = session();
        assert!(!s.is_expired(Utc::now()));
        assert!(s.is_expired(Utc::now() + Duration::seconds(7200)));
    }
}
