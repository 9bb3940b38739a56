//! Transcode profile configuration.
//!
//! Profiles are loaded once at process start from a JSON document mapping
//! profile name to its parameters, and are immutable for the process lifetime.
//! An entry missing required fields is skipped with a warning rather than
//! failing the whole set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::AppError;

/// One playback rendition target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscodeProfile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Video bitrate in kbps.
    pub video_bitrate: u32,
    /// Audio bitrate in kbps.
    pub audio_bitrate: u32,
    pub preset: Option<String>,
    pub frame_rate: Option<f32>,
    pub keyframe_interval: Option<u32>,
    pub tune: Option<String>,
}

/// Raw config entry; every field optional so a partial entry parses and can
/// be reported instead of poisoning its siblings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProfile {
    width: Option<u32>,
    height: Option<u32>,
    video_bitrate: Option<u32>,
    audio_bitrate: Option<u32>,
    preset: Option<String>,
    frame_rate: Option<f32>,
    keyframe_interval: Option<u32>,
    tune: Option<String>,
}

impl RawProfile {
    fn into_profile(self, name: &str) -> Option<TranscodeProfile> {
        let (width, height, video_bitrate, audio_bitrate) = match (
            self.width,
            self.height,
            self.video_bitrate,
            self.audio_bitrate,
        ) {
            (Some(w), Some(h), Some(vb), Some(ab)) if w > 0 && h > 0 && vb > 0 && ab > 0 => {
                (w, h, vb, ab)
            }
            _ => return None,
        };
        Some(TranscodeProfile {
            name: name.to_string(),
            width,
            height,
            video_bitrate,
            audio_bitrate,
            preset: self.preset,
            frame_rate: self.frame_rate,
            keyframe_interval: self.keyframe_interval,
            tune: self.tune,
        })
    }
}

/// Parse a profile set from JSON. Invalid or incomplete entries are skipped
/// with a warning; an empty result is an error since the worker would have
/// nothing to produce.
pub fn load_profiles_from_str(json: &str) -> Result<Vec<TranscodeProfile>, AppError> {
    // BTreeMap for deterministic ordering across runs.
    let raw: BTreeMap<String, RawProfile> = serde_json::from_str(json)
        .map_err(|e| AppError::Config(format!("Invalid profile configuration: {}", e)))?;

    let mut profiles = Vec::with_capacity(raw.len());
    for (name, entry) in raw {
        match entry.into_profile(&name) {
            Some(profile) => profiles.push(profile),
            None => {
                tracing::warn!(
                    profile = %name,
                    "Skipping transcode profile with missing or zero required fields"
                );
            }
        }
    }

    if profiles.is_empty() {
        return Err(AppError::Config(
            "No valid transcode profiles configured".into(),
        ));
    }
    Ok(profiles)
}

pub fn load_profiles(path: impl AsRef<Path>) -> Result<Vec<TranscodeProfile>, AppError> {
    let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        AppError::Config(format!(
            "Failed to read profile configuration {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;
    load_profiles_from_str(&json)
}

/// Built-in profile set used when no configuration file is provided.
pub fn default_profiles() -> Vec<TranscodeProfile> {
    load_profiles_from_str(
        r#"{
            "360p":  {"width": 640,  "height": 360,  "videoBitrate": 800,  "audioBitrate": 96},
            "480p":  {"width": 854,  "height": 480,  "videoBitrate": 1400, "audioBitrate": 128},
            "720p":  {"width": 1280, "height": 720,  "videoBitrate": 2800, "audioBitrate": 128},
            "1080p": {"width": 1920, "height": 1080, "videoBitrate": 5000, "audioBitrate": 192}
        }"#,
    )
    .expect("built-in profile set is valid")
}
