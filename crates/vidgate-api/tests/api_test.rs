//! In-process HTTP tests over the full upload surface.

use axum_test::TestServer;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

use vidgate_api::{build_router, AppState, SessionLinkTracker};
use vidgate_core::models::{AssetStatus, AssetVariant};
use vidgate_core::{
    AppError, AssetRepository, AssetUpsert, Config, InMemoryAssetRepository, TranscodeProfile,
};
use vidgate_queue::FileQueue;
use vidgate_storage::{keys, LocalStorage, Storage};
use vidgate_transcode::{OrchestratorConfig, TranscodeOrchestrator, Transcoder};
use vidgate_upload::{InMemorySessionStore, UploadManager};

struct TestApp {
    server: TestServer,
    sessions: Arc<InMemorySessionStore>,
    assets: Arc<InMemoryAssetRepository>,
    storage: Arc<LocalStorage>,
    queue: Arc<FileQueue>,
    config: Arc<Config>,
    _root: TempDir,
}

async fn test_app() -> TestApp {
    let root = TempDir::new().unwrap();
    let config = Arc::new(Config {
        server_port: 0,
        environment: "test".into(),
        staging_dir: root.path().join("staging").to_string_lossy().into_owned(),
        chunk_size: 8,
        max_file_size: 1024,
        allowed_content_types: vec!["video/mp4".into()],
        session_ttl_secs: 3600,
        dedup_enabled: true,
        storage_path: root.path().join("media").to_string_lossy().into_owned(),
        storage_bucket: None,
        queue_dir: root.path().join("queue").to_string_lossy().into_owned(),
        ffmpeg_path: "ffmpeg".into(),
        ffprobe_path: "ffprobe".into(),
        max_concurrent_transcodes: 1,
        thumbnail_width: 640,
        profiles_path: None,
    });

    let storage = Arc::new(LocalStorage::new(&config.storage_path).await.unwrap());
    let queue = Arc::new(FileQueue::new(&config.queue_dir).await.unwrap());
    let sessions = Arc::new(InMemorySessionStore::new());
    let assets = Arc::new(InMemoryAssetRepository::new());
    let manager = Arc::new(UploadManager::new(
        sessions.clone(),
        assets.clone(),
        storage.clone(),
        queue.clone(),
        config.clone(),
    ));

    let state = Arc::new(AppState {
        manager,
        sessions: sessions.clone(),
        assets: assets.clone(),
        config: config.clone(),
    });
    let server = TestServer::new(build_router(state)).unwrap();

    TestApp {
        server,
        sessions,
        assets,
        storage,
        queue,
        config,
        _root: root,
    }
}

fn init_body(file_size: u64) -> Value {
    json!({
        "filename": "clip.mp4",
        "fileSize": file_size,
        "fileType": "video/mp4",
    })
}

async fn poll_status(server: &TestServer, upload_id: &str, wanted: &str) -> Value {
    for _ in 0..200 {
        let response = server
            .get(&format!("/api/v0/uploads/{}", upload_id))
            .await;
        let body: Value = response.json();
        if body["status"] == wanted {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("upload {} never reached status {}", upload_id, wanted);
}

#[tokio::test]
async fn init_returns_created_with_chunking_parameters() {
    let app = test_app().await;

    let response = app.server.post("/api/v0/uploads").json(&init_body(20)).await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["chunkSize"], 8);
    assert!(Uuid::parse_str(body["uploadId"].as_str().unwrap()).is_ok());
    assert!(body["expiresAt"].is_string());
}

#[tokio::test]
async fn init_rejects_zero_size_and_missing_fields() {
    let app = test_app().await;

    let response = app.server.post("/api/v0/uploads").json(&init_body(0)).await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // Missing filename fails body deserialization, same error shape
    let response = app
        .server
        .post("/api/v0/uploads")
        .json(&json!({"fileSize": 10, "fileType": "video/mp4"}))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let response = app
        .server
        .post("/api/v0/uploads")
        .json(&json!({
            "filename": "clip.mp4",
            "fileSize": 10,
            "fileType": "application/zip",
        }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn init_rejects_oversized_declared_file() {
    let app = test_app().await;

    // max_file_size is 1024 in the test config
    let response = app
        .server
        .post("/api/v0/uploads")
        .json(&init_body(4096))
        .await;
    response.assert_status(axum::http::StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json();
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn unknown_ids_return_not_found() {
    let app = test_app().await;

    let response = app
        .server
        .get(&format!("/api/v0/uploads/{}", Uuid::new_v4()))
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);

    let response = app
        .server
        .put(&format!(
            "/api/v0/uploads/{}/chunks/0",
            Uuid::new_v4()
        ))
        .add_query_param("totalChunks", 2)
        .bytes(b"xxxx".to_vec().into())
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);

    let response = app
        .server
        .get(&format!("/api/v0/assets/{}", Uuid::new_v4()))
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn two_chunk_upload_reaches_handed_off_with_the_content_hash() {
    let app = test_app().await;
    let data = b"0123456789ab"; // 12 bytes, chunk size 8

    let response = app
        .server
        .post("/api/v0/uploads")
        .json(&init_body(data.len() as u64))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let upload_id = response.json::<Value>()["uploadId"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .server
        .put(&format!("/api/v0/uploads/{}/chunks/0", upload_id))
        .add_query_param("totalChunks", 2)
        .bytes(data[..8].to_vec().into())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["received"], 1);
    assert_eq!(body["total"], 2);

    let response = app
        .server
        .put(&format!("/api/v0/uploads/{}/chunks/1", upload_id))
        .add_query_param("totalChunks", 2)
        .bytes(data[8..].to_vec().into())
        .await;
    response.assert_status_ok();

    let snapshot = poll_status(&app.server, &upload_id, "handed_off").await;
    assert_eq!(snapshot["progress"], 100.0);
    assert_eq!(
        snapshot["contentHash"].as_str().unwrap(),
        hex::encode(Sha256::digest(data))
    );
}

#[tokio::test]
async fn retried_chunk_is_idempotent_over_http() {
    let app = test_app().await;

    let response = app
        .server
        .post("/api/v0/uploads")
        .json(&init_body(12))
        .await;
    let upload_id = response.json::<Value>()["uploadId"]
        .as_str()
        .unwrap()
        .to_string();

    for _ in 0..3 {
        let response = app
            .server
            .put(&format!("/api/v0/uploads/{}/chunks/0", upload_id))
            .add_query_param("totalChunks", 2)
            .bytes(b"01234567".to_vec().into())
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["received"], 1);
    }
}

/// Codec stand-in that writes deterministic bytes instead of shelling out.
struct FixedOutputTranscoder;

#[async_trait::async_trait]
impl Transcoder for FixedOutputTranscoder {
    async fn probe_duration(&self, _input: &Path) -> Result<f64, AppError> {
        Ok(60.0)
    }

    async fn transcode(
        &self,
        _input: &Path,
        output: &Path,
        profile: &TranscodeProfile,
    ) -> Result<(), AppError> {
        tokio::fs::write(output, profile.name.as_bytes()).await?;
        Ok(())
    }

    async fn extract_frame(
        &self,
        _input: &Path,
        output: &Path,
        _offset_secs: f64,
        _width: u32,
    ) -> Result<(), AppError> {
        tokio::fs::write(output, b"frame").await?;
        Ok(())
    }
}

fn rendition_profile() -> TranscodeProfile {
    TranscodeProfile {
        name: "360p".into(),
        width: 640,
        height: 360,
        video_bitrate: 800,
        audio_bitrate: 96,
        preset: None,
        frame_rate: None,
        keyframe_interval: None,
        tune: None,
    }
}

fn count_files(dir: &Path) -> usize {
    let mut count = 0;
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                count += count_files(&path);
            } else {
                count += 1;
            }
        }
    }
    count
}

async fn upload_in_two_chunks(server: &TestServer, data: &[u8]) -> String {
    let response = server
        .post("/api/v0/uploads")
        .json(&init_body(data.len() as u64))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let upload_id = response.json::<Value>()["uploadId"]
        .as_str()
        .unwrap()
        .to_string();

    for (index, chunk) in data.chunks(8).enumerate() {
        let response = server
            .put(&format!("/api/v0/uploads/{}/chunks/{}", upload_id, index))
            .add_query_param("totalChunks", 2)
            .bytes(chunk.to_vec().into())
            .await;
        response.assert_status_ok();
    }

    poll_status(server, &upload_id, "handed_off").await;
    upload_id
}

async fn poll_asset_link(server: &TestServer, upload_id: &str) -> Uuid {
    for _ in 0..200 {
        let response = server
            .get(&format!("/api/v0/uploads/{}", upload_id))
            .await;
        let body: Value = response.json();
        if let Some(id) = body["assetId"].as_str() {
            return Uuid::parse_str(id).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("upload {} was never linked to an asset", upload_id);
}

#[tokio::test]
async fn identical_uploads_converge_on_one_object_and_one_asset() {
    let app = test_app().await;
    let data = b"0123456789ab";
    let hash = hex::encode(Sha256::digest(data));

    // Both uploads finish before any processing has produced an asset, so
    // dedup cannot short-circuit the second one; both store and both publish.
    let first = upload_in_two_chunks(&app.server, data).await;
    let second = upload_in_two_chunks(&app.server, data).await;

    // The deterministic source key collapses them into one stored object.
    let source = keys::source_key(Uuid::nil(), &hash, "clip.mp4");
    assert!(app.storage.exists(&source).await.unwrap());
    assert_eq!(count_files(Path::new(&app.config.storage_path)), 1);

    // Drain both handoff messages through the worker.
    let orchestrator = Arc::new(
        TranscodeOrchestrator::new(
            app.queue.clone(),
            app.storage.clone(),
            app.assets.clone(),
            Arc::new(FixedOutputTranscoder),
            vec![rendition_profile()],
            OrchestratorConfig {
                max_concurrent_transcodes: 1,
                ..Default::default()
            },
        )
        .with_session_tracker(Arc::new(SessionLinkTracker::new(app.sessions.clone()))),
    );
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let worker = tokio::spawn(orchestrator.run(shutdown_rx));

    let first_asset = poll_asset_link(&app.server, &first).await;
    let second_asset = poll_asset_link(&app.server, &second).await;
    assert_eq!(first_asset, second_asset);

    let stored = app.assets.find_by_hash(&hash).await.unwrap().unwrap();
    assert_eq!(stored.id, first_asset);
    assert_eq!(stored.status, AssetStatus::Ready);

    let response = app
        .server
        .get(&format!("/api/v0/assets/{}", first_asset))
        .await;
    response.assert_status_ok();

    let _ = shutdown_tx.send(()).await;
    let _ = worker.await;
}

#[tokio::test]
async fn asset_read_surface_lists_variants_by_descending_bitrate() {
    let app = test_app().await;

    let mut variants = HashMap::new();
    variants.insert(
        "360p".to_string(),
        AssetVariant {
            width: 640,
            height: 360,
            bitrate: 800,
            storage_key: "media/o/h/renditions/360p.mp4".into(),
        },
    );
    variants.insert(
        "720p".to_string(),
        AssetVariant {
            width: 1280,
            height: 720,
            bitrate: 2800,
            storage_key: "media/o/h/renditions/720p.mp4".into(),
        },
    );
    let asset = app
        .assets
        .upsert_by_hash(AssetUpsert {
            owner_id: Uuid::new_v4(),
            content_hash: "cafebabe".into(),
            storage_key: "media/o/h/source/clip.mp4".into(),
            content_type: "video/mp4".into(),
            status: AssetStatus::Ready,
            variants,
            thumbnail_key: Some("media/o/h/thumbnail.jpg".into()),
            manifest_key: Some("media/o/h/master.m3u8".into()),
        })
        .await
        .unwrap();

    let response = app
        .server
        .get(&format!("/api/v0/assets/{}", asset.id))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["variants"][0]["profile"], "720p");
    assert_eq!(body["variants"][1]["profile"], "360p");
    assert_eq!(body["thumbnailKey"], "media/o/h/thumbnail.jpg");
    assert_eq!(body["manifestKey"], "media/o/h/master.m3u8");
}
