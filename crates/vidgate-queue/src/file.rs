//! Directory-backed durable queue.
//!
//! Each message is one JSON file named `{publish_millis:016}-{uuid}.json` so
//! a plain lexicographic sort yields publish order. Publication writes a temp
//! file and renames it into place; a reader never observes a partial message.
//! Ack deletes the file, nack drops the in-memory in-flight mark so the file
//! is picked up again. The in-flight set is process-local: after a crash every
//! unacked message is redelivered, which is exactly the at-least-once
//! contract consumers must expect.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use vidgate_core::models::ProcessingMessage;

use crate::error::{QueueError, QueueResult};
use crate::{Delivery, HandoffQueue};

const MESSAGE_EXT: &str = "json";
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

pub struct FileQueue {
    dir: PathBuf,
    inflight: Arc<Mutex<HashSet<String>>>,
    notify: Arc<Notify>,
    poll_interval: Duration,
}

impl FileQueue {
    /// Open (and create if missing) a queue directory.
    pub async fn new(dir: impl Into<PathBuf>) -> QueueResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            QueueError::ConfigError(format!(
                "Failed to create queue directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self {
            dir,
            inflight: Arc::new(Mutex::new(HashSet::new())),
            notify: Arc::new(Notify::new()),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        })
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn message_filename(message: &ProcessingMessage) -> String {
        format!(
            "{:016}-{}.{}",
            message.timestamp.timestamp_millis().max(0),
            Uuid::new_v4(),
            MESSAGE_EXT
        )
    }

    /// Oldest message file not currently in flight, if any.
    async fn next_candidate(&self) -> QueueResult<Option<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| QueueError::ReceiveFailed(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| QueueError::ReceiveFailed(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(&format!(".{}", MESSAGE_EXT)) {
                names.push(name);
            }
        }
        names.sort();

        let inflight = self.inflight.lock().await;
        Ok(names.into_iter().find(|n| !inflight.contains(n)))
    }
}

#[async_trait]
impl HandoffQueue for FileQueue {
    async fn publish(&self, message: &ProcessingMessage) -> QueueResult<()> {
        let payload = serde_json::to_vec_pretty(message)
            .map_err(|e| QueueError::PublishFailed(format!("serialize: {}", e)))?;

        let final_name = Self::message_filename(message);
        let tmp_path = self.dir.join(format!(".tmp-{}", Uuid::new_v4()));
        let final_path = self.dir.join(&final_name);

        fs::write(&tmp_path, &payload)
            .await
            .map_err(|e| QueueError::PublishFailed(format!("write: {}", e)))?;
        fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| QueueError::PublishFailed(format!("rename: {}", e)))?;

        tracing::info!(
            upload_id = %message.upload_id,
            content_hash = %message.content_hash,
            receipt = %final_name,
            "Published processing message"
        );
        self.notify.notify_one();
        Ok(())
    }

    async fn receive(&self) -> QueueResult<Delivery> {
        loop {
            if let Some(delivery) = self.try_receive().await? {
                return Ok(delivery);
            }
            // Wake on local publish, or poll in case another process wrote
            // into the directory.
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn try_receive(&self) -> QueueResult<Option<Delivery>> {
        loop {
            let Some(name) = self.next_candidate().await? else {
                return Ok(None);
            };

            {
                let mut inflight = self.inflight.lock().await;
                // Lost a race with another consumer task; rescan.
                if !inflight.insert(name.clone()) {
                    continue;
                }
            }

            let path = self.dir.join(&name);
            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // Acked by someone else between scan and read.
                    self.inflight.lock().await.remove(&name);
                    continue;
                }
                Err(e) => {
                    self.inflight.lock().await.remove(&name);
                    return Err(QueueError::ReceiveFailed(e.to_string()));
                }
            };

            match serde_json::from_slice::<ProcessingMessage>(&bytes) {
                Ok(message) => {
                    return Ok(Some(Delivery {
                        receipt: name,
                        message,
                    }));
                }
                Err(e) => {
                    // Poison message: set it aside so it cannot wedge the queue.
                    tracing::warn!(receipt = %name, error = %e, "Quarantining undecodable message");
                    let _ = fs::rename(&path, self.dir.join(format!("{}.bad", name))).await;
                    self.inflight.lock().await.remove(&name);
                }
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        let path = self.dir.join(&delivery.receipt);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(QueueError::SettleFailed(format!(
                    "Failed to delete {}: {}",
                    path.display(),
                    e
                )));
            }
        }
        self.inflight.lock().await.remove(&delivery.receipt);
        tracing::debug!(receipt = %delivery.receipt, "Acked message");
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.inflight.lock().await.remove(&delivery.receipt);
        tracing::debug!(receipt = %delivery.receipt, "Nacked message, returning to queue");
        self.notify.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn message(hash: &str) -> ProcessingMessage {
        ProcessingMessage::new_upload(
            Uuid::new_v4(),
            Uuid::new_v4(),
            format!("media/x/{}/source/a.mp4", hash),
            None,
            "video/mp4".into(),
            HashMap::new(),
            hash.into(),
        )
    }

    async fn queue(dir: &TempDir) -> FileQueue {
        FileQueue::new(dir.path())
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn publish_receive_ack_drains_the_queue() {
        let dir = TempDir::new().unwrap();
        let q = queue(&dir).await;

        q.publish(&message("h1")).await.unwrap();
        let delivery = q.try_receive().await.unwrap().unwrap();
        assert_eq!(delivery.message.content_hash, "h1");

        // In flight: not visible to another receive
        assert!(q.try_receive().await.unwrap().is_none());

        q.ack(&delivery).await.unwrap();
        assert!(q.try_receive().await.unwrap().is_none());
        assert!(!dir.path().join(&delivery.receipt).exists());
    }

    #[tokio::test]
    async fn nack_makes_the_message_visible_again() {
        let dir = TempDir::new().unwrap();
        let q = queue(&dir).await;

        q.publish(&message("h1")).await.unwrap();
        let first = q.try_receive().await.unwrap().unwrap();
        q.nack(&first).await.unwrap();

        let second = q.try_receive().await.unwrap().unwrap();
        assert_eq!(second.receipt, first.receipt);
        assert_eq!(second.message, first.message);
    }

    #[tokio::test]
    async fn unacked_messages_survive_restart() {
        let dir = TempDir::new().unwrap();
        {
            let q = queue(&dir).await;
            q.publish(&message("h1")).await.unwrap();
            // Received but never acked: the consumer "crashes" here.
            let _delivery = q.try_receive().await.unwrap().unwrap();
        }

        let restarted = queue(&dir).await;
        let delivery = restarted.try_receive().await.unwrap().unwrap();
        assert_eq!(delivery.message.content_hash, "h1");
    }

    #[tokio::test]
    async fn delivers_oldest_first() {
        let dir = TempDir::new().unwrap();
        let q = queue(&dir).await;

        let mut older = message("old");
        older.timestamp = older.timestamp - chrono::Duration::seconds(60);
        q.publish(&message("new")).await.unwrap();
        q.publish(&older).await.unwrap();

        let first = q.try_receive().await.unwrap().unwrap();
        assert_eq!(first.message.content_hash, "old");
    }

    #[tokio::test]
    async fn undecodable_message_is_quarantined() {
        let dir = TempDir::new().unwrap();
        let q = queue(&dir).await;

        tokio::fs::write(dir.path().join("0000000000000000-garbage.json"), b"not json")
            .await
            .unwrap();
        q.publish(&message("ok")).await.unwrap();

        let delivery = q.try_receive().await.unwrap().unwrap();
        assert_eq!(delivery.message.content_hash, "ok");
        assert!(dir
            .path()
            .join("0000000000000000-garbage.json.bad")
            .exists());
    }

    #[tokio::test]
    async fn receive_wakes_on_publish() {
        let dir = TempDir::new().unwrap();
        let q = Arc::new(queue(&dir).await);

        let waiter = {
            let q = q.clone();
            tokio::spawn(async move { q.receive().await.unwrap() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.publish(&message("h1")).await.unwrap();

        let delivery = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivery.message.content_hash, "h1");
    }
}
