//! Authoritative state for upload attempts.
//!
//! The store owns the per-chunk idempotency marks: the already-received check
//! and the counter increment happen under one lock, so concurrent duplicate
//! delivery of the same index (retrying clients, duplicated network frames)
//! can never double-count or re-trigger assembly. TTL expiry is passive: an
//! expired session is dropped the next time anything touches it, not by a
//! background scan.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use vidgate_core::error::AppError;
use vidgate_core::models::{SessionStatus, UploadSession};

/// Outcome of marking one chunk received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkReceipt {
    /// The index was already marked; nothing changed.
    AlreadyReceived { received: u32, total: u32 },
    /// The index was new. `complete` is true on exactly the one call that
    /// brought the session to all-chunks-received (and moved it to
    /// `Assembling`), so the caller can trigger assembly exactly once.
    Accepted {
        received: u32,
        total: u32,
        complete: bool,
    },
}

impl ChunkReceipt {
    pub fn received(&self) -> u32 {
        match self {
            ChunkReceipt::AlreadyReceived { received, .. }
            | ChunkReceipt::Accepted { received, .. } => *received,
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: UploadSession) -> Result<(), AppError>;

    /// Fetch a session. Expired sessions are treated as absent.
    async fn get(&self, id: Uuid) -> Result<Option<UploadSession>, AppError>;

    /// Atomically: check the idempotency mark for `index`, set it, bump the
    /// received counter, and transition `Initialized -> Uploading` on first
    /// chunk and `-> Assembling` when the last chunk lands.
    async fn mark_chunk_received(&self, id: Uuid, index: u32) -> Result<ChunkReceipt, AppError>;

    /// Move the session forward. Rejects non-monotonic transitions.
    async fn update_status(&self, id: Uuid, status: SessionStatus) -> Result<(), AppError>;

    /// Terminal failure with the captured message. Idempotent; ignored once
    /// the session is already terminal.
    async fn set_failed(&self, id: Uuid, error: String) -> Result<(), AppError>;

    async fn set_content_hash(&self, id: Uuid, content_hash: String) -> Result<(), AppError>;

    async fn link_asset(&self, id: Uuid, asset_id: Uuid) -> Result<(), AppError>;
}

struct SessionEntry {
    session: UploadSession,
    /// Per-chunk idempotency marks; same lifetime as the session itself.
    received: HashSet<u32>,
}

/// In-process session store. One lock over the session map keeps the
/// mark-and-count step atomic; operations on different sessions only contend
/// for the duration of a map access.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, SessionEntry>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Remove-if-expired check shared by every accessor.
fn live_entry<'a>(
    sessions: &'a mut HashMap<Uuid, SessionEntry>,
    id: Uuid,
) -> Option<&'a mut SessionEntry> {
    let expired = sessions
        .get(&id)
        .map(|e| e.session.is_expired(Utc::now()))
        .unwrap_or(false);
    if expired {
        sessions.remove(&id);
        tracing::debug!(session_id = %id, "Dropped expired upload session");
        return None;
    }
    sessions.get_mut(&id)
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Upload session not found: {}", id))
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: UploadSession) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            session.id,
            SessionEntry {
                session,
                received: HashSet::new(),
            },
        );
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadSession>, AppError> {
        let mut sessions = self.sessions.lock().await;
        Ok(live_entry(&mut sessions, id).map(|e| e.session.clone()))
    }

    async fn mark_chunk_received(&self, id: Uuid, index: u32) -> Result<ChunkReceipt, AppError> {
        let mut sessions = self.sessions.lock().await;
        let entry = live_entry(&mut sessions, id).ok_or_else(|| not_found(id))?;
        let session = &mut entry.session;

        if index >= session.total_chunks {
            return Err(AppError::Validation(format!(
                "Chunk index {} out of range for {} chunks",
                index, session.total_chunks
            )));
        }

        if !entry.received.insert(index) {
            return Ok(ChunkReceipt::AlreadyReceived {
                received: session.received_chunks,
                total: session.total_chunks,
            });
        }

        session.received_chunks += 1;
        session.last_chunk_at = Some(Utc::now());
        debug_assert!(session.received_chunks <= session.total_chunks);

        if session.status == SessionStatus::Initialized {
            session.status = SessionStatus::Uploading;
        }

        let complete = session.received_chunks == session.total_chunks;
        if complete && session.status == SessionStatus::Uploading {
            session.status = SessionStatus::Assembling;
        }

        Ok(ChunkReceipt::Accepted {
            received: session.received_chunks,
            total: session.total_chunks,
            complete,
        })
    }

    async fn update_status(&self, id: Uuid, status: SessionStatus) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().await;
        let entry = live_entry(&mut sessions, id).ok_or_else(|| not_found(id))?;
        if !entry.session.status.can_transition_to(status) {
            return Err(AppError::Internal(format!(
                "Invalid session transition {} -> {} for {}",
                entry.session.status, status, id
            )));
        }
        entry.session.status = status;
        Ok(())
    }

    async fn set_failed(&self, id: Uuid, error: String) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().await;
        let entry = live_entry(&mut sessions, id).ok_or_else(|| not_found(id))?;
        if entry.session.status.is_terminal() {
            return Ok(());
        }
        entry.session.status = SessionStatus::Failed;
        entry.session.error = Some(error);
        Ok(())
    }

    async fn set_content_hash(&self, id: Uuid, content_hash: String) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().await;
        let entry = live_entry(&mut sessions, id).ok_or_else(|| not_found(id))?;
        entry.session.content_hash = Some(content_hash);
        Ok(())
    }

    async fn link_asset(&self, id: Uuid, asset_id: Uuid) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().await;
        let entry = live_entry(&mut sessions, id).ok_or_else(|| not_found(id))?;
        entry.session.asset_id = Some(asset_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn two_chunk_session() -> UploadSession {
        UploadSession::new(
            Uuid::new_v4(),
            "clip.mp4".into(),
            10_000_000,
            "video/mp4".into(),
            StdHashMap::new(),
            5_000_000,
            None,
            3600,
        )
    }

    #[tokio::test]
    async fn duplicate_chunk_never_double_counts() {
        let store = InMemorySessionStore::new();
        let session = two_chunk_session();
        let id = session.id;
        store.create(session).await.unwrap();

        let first = store.mark_chunk_received(id, 0).await.unwrap();
        assert_eq!(
            first,
            ChunkReceipt::Accepted {
                received: 1,
                total: 2,
                complete: false
            }
        );

        let retry = store.mark_chunk_received(id, 0).await.unwrap();
        assert_eq!(
            retry,
            ChunkReceipt::AlreadyReceived {
                received: 1,
                total: 2
            }
        );

        let snapshot = store.get(id).await.unwrap().unwrap();
        assert_eq!(snapshot.received_chunks, 1);
        assert_eq!(snapshot.status, SessionStatus::Uploading);
    }

    #[tokio::test]
    async fn completion_is_signalled_exactly_once() {
        let store = InMemorySessionStore::new();
        let session = two_chunk_session();
        let id = session.id;
        store.create(session).await.unwrap();

        store.mark_chunk_received(id, 0).await.unwrap();
        let last = store.mark_chunk_received(id, 1).await.unwrap();
        assert_eq!(
            last,
            ChunkReceipt::Accepted {
                received: 2,
                total: 2,
                complete: true
            }
        );

        // Late retry of the final chunk reports progress, not completion.
        let retry = store.mark_chunk_received(id, 1).await.unwrap();
        assert!(matches!(retry, ChunkReceipt::AlreadyReceived { .. }));
        let snapshot = store.get(id).await.unwrap().unwrap();
        assert_eq!(snapshot.status, SessionStatus::Assembling);
    }

    #[tokio::test]
    async fn concurrent_duplicate_delivery_counts_once() {
        let store = InMemorySessionStore::new();
        let mut session = two_chunk_session();
        session.file_size = 50_000_000;
        session.total_chunks = 10;
        let id = session.id;
        store.create(session).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.mark_chunk_received(id, 3).await.unwrap()
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), ChunkReceipt::Accepted { .. }) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);

        let snapshot = store.get(id).await.unwrap().unwrap();
        assert_eq!(snapshot.received_chunks, 1);
        assert!(snapshot.received_chunks <= snapshot.total_chunks);
    }

    #[tokio::test]
    async fn out_of_range_index_is_rejected() {
        let store = InMemorySessionStore::new();
        let session = two_chunk_session();
        let id = session.id;
        store.create(session).await.unwrap();

        assert!(matches!(
            store.mark_chunk_received(id, 2).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn expired_session_is_gone_on_access() {
        let store = InMemorySessionStore::new();
        let session = UploadSession::new(
            Uuid::new_v4(),
            "clip.mp4".into(),
            100,
            "video/mp4".into(),
            StdHashMap::new(),
            100,
            None,
            0, // expires immediately
        );
        let id = session.id;
        store.create(session).await.unwrap();

        assert!(store.get(id).await.unwrap().is_none());
        assert!(matches!(
            store.mark_chunk_received(id, 0).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_is_terminal_and_idempotent() {
        let store = InMemorySessionStore::new();
        let session = two_chunk_session();
        let id = session.id;
        store.create(session).await.unwrap();

        store.set_failed(id, "disk on fire".into()).await.unwrap();
        store.set_failed(id, "second failure".into()).await.unwrap();

        let snapshot = store.get(id).await.unwrap().unwrap();
        assert_eq!(snapshot.status, SessionStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("disk on fire"));

        assert!(store
            .update_status(id, SessionStatus::Complete)
            .await
            .is_err());
    }
}
