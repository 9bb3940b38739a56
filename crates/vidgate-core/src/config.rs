//! Configuration module
//!
//! Environment-driven configuration for the upload service and the transcode
//! worker. All values have working defaults so a dev instance starts with no
//! environment at all; `dotenvy` is loaded by the binary before this runs.

use std::env;
use std::str::FromStr;

use crate::error::AppError;

const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;
const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_MAX_CONCURRENT_TRANSCODES: usize = 2;
const DEFAULT_THUMBNAIL_WIDTH: u32 = 640;

/// Service configuration, shared by the API process and the transcode worker.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,

    // Upload ingestion
    pub staging_dir: String,
    pub chunk_size: u64,
    pub max_file_size: u64,
    pub allowed_content_types: Vec<String>,
    pub session_ttl_secs: u64,
    pub dedup_enabled: bool,

    // Storage and handoff
    pub storage_path: String,
    pub storage_bucket: Option<String>,
    pub queue_dir: String,

    // Transcoding
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub max_concurrent_transcodes: usize,
    pub thumbnail_width: u32,
    pub profiles_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let config = Self {
            server_port: parse_env("VIDGATE_PORT", 3000)?,
            environment: env::var("VIDGATE_ENV").unwrap_or_else(|_| "development".to_string()),
            staging_dir: env::var("VIDGATE_STAGING_DIR")
                .unwrap_or_else(|_| "/tmp/vidgate/staging".to_string()),
            chunk_size: parse_env("VIDGATE_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            max_file_size: parse_env("VIDGATE_MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE)?,
            allowed_content_types: parse_list(
                "VIDGATE_ALLOWED_CONTENT_TYPES",
                &["video/mp4", "video/quicktime", "video/webm", "video/x-matroska"],
            ),
            session_ttl_secs: parse_env("VIDGATE_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            dedup_enabled: parse_env("VIDGATE_DEDUP_ENABLED", true)?,
            storage_path: env::var("VIDGATE_STORAGE_PATH")
                .unwrap_or_else(|_| "/var/lib/vidgate/media".to_string()),
            storage_bucket: env::var("VIDGATE_STORAGE_BUCKET").ok(),
            queue_dir: env::var("VIDGATE_QUEUE_DIR")
                .unwrap_or_else(|_| "/var/lib/vidgate/queue".to_string()),
            ffmpeg_path: env::var("VIDGATE_FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("VIDGATE_FFPROBE_PATH")
                .unwrap_or_else(|_| "ffprobe".to_string()),
            max_concurrent_transcodes: parse_env(
                "VIDGATE_MAX_CONCURRENT_TRANSCODES",
                DEFAULT_MAX_CONCURRENT_TRANSCODES,
            )?,
            thumbnail_width: parse_env("VIDGATE_THUMBNAIL_WIDTH", DEFAULT_THUMBNAIL_WIDTH)?,
            profiles_path: env::var("VIDGATE_PROFILES_PATH").ok(),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be greater than 0".into()));
        }
        if self.max_file_size == 0 {
            return Err(AppError::Config(
                "max_file_size must be greater than 0".into(),
            ));
        }
        if self.max_concurrent_transcodes == 0 {
            return Err(AppError::Config(
                "max_concurrent_transcodes must be greater than 0".into(),
            ));
        }
        if self.allowed_content_types.is_empty() {
            return Err(AppError::Config(
                "allowed_content_types must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn is_content_type_allowed(&self, content_type: &str) -> bool {
        self.allowed_content_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("Invalid value for {}: {}", key, value))),
        Err(_) => Ok(default),
    }
}

fn parse_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(value) => value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server_port: 3000,
            environment: "test".into(),
            staging_dir: "/tmp/staging".into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_content_types: vec!["video/mp4".into()],
            session_ttl_secs: 3600,
            dedup_enabled: true,
            storage_path: "/tmp/media".into(),
            storage_bucket: None,
            queue_dir: "/tmp/queue".into(),
            ffmpeg_path: "ffmpeg".into(),
            ffprobe_path: "ffprobe".into(),
            max_concurrent_transcodes: 2,
            thumbnail_width: 640,
            profiles_path: None,
        }
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let mut config = base_config();
        config.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn content_type_check_is_case_insensitive() {
        let config = base_config();
        assert!(config.is_content_type_allowed("Video/MP4"));
        assert!(!config.is_content_type_allowed("image/png"));
    }
}
